//! Errors that can occur in msflagstats

use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

use crate::engine::EngineError;

/// A stage of the per-dataset pipeline, used to locate failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// row count and column names of the main table
    Inventory,
    /// loading the metadata subtables
    Metadata,
    /// per-antenna statistics from the baseline fold
    PerAntenna,
    /// per-scan statistics
    PerScan,
    /// per-channel, per-correlation statistics
    PerChannel,
    /// cross-window histogram series
    Histogram,
    /// single ratio over the whole flag column
    Global,
}

impl Stage {
    /// A short name for this stage, also used as the duration registry key.
    pub const fn name(self) -> &'static str {
        match self {
            Stage::Inventory => "inventory",
            Stage::Metadata => "metadata",
            Stage::PerAntenna => "per-antenna",
            Stage::PerScan => "per-scan",
            Stage::PerChannel => "per-channel",
            Stage::Histogram => "histogram",
            Stage::Global => "global",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Error, Debug)]
/// Errors raised while computing flag statistics for a single dataset.
pub enum StatsError {
    /// A required metadata subtable is absent.
    #[error("Required subtable {subtable} is missing from {dataset}")]
    MetadataMissing {
        /// The dataset that was searched
        dataset: String,
        /// The name of the subtable
        subtable: String,
    },

    /// An antenna id appears in the data but not in the ANTENNA table.
    #[error("Antenna {antenna_id} has no entry in the ANTENNA table, which has {num_antennas} rows")]
    UnresolvedAntenna {
        /// The antenna id found in the data
        antenna_id: i64,
        /// The number of rows in the ANTENNA table
        num_antennas: usize,
    },

    /// A field id appears in the data but not in the FIELD table.
    #[error("Field {field_id} has no entry in the FIELD table, which has {num_fields} rows")]
    UnresolvedField {
        /// The field id found in the data
        field_id: i64,
        /// The number of rows in the FIELD table
        num_fields: usize,
    },

    /// A data description id appears in the data but not in the DATA_DESCRIPTION table.
    #[error("Data description {data_desc_id} has no entry in the DATA_DESCRIPTION table, which has {num_data_descs} rows")]
    UnresolvedDataDescription {
        /// The data description id found in the data
        data_desc_id: i64,
        /// The number of rows in the DATA_DESCRIPTION table
        num_data_descs: usize,
    },

    /// A spectral window id is referenced but absent from the SPECTRAL_WINDOW table.
    #[error("Spectral window {spectral_window_id} has no entry in the SPECTRAL_WINDOW table, which has {num_spectral_windows} rows")]
    UnresolvedSpectralWindow {
        /// The referenced spectral window id
        spectral_window_id: i64,
        /// The number of rows in the SPECTRAL_WINDOW table
        num_spectral_windows: usize,
    },

    /// A polarization id is referenced but absent from the POLARIZATION table.
    #[error("Polarization {polarization_id} has no entry in the POLARIZATION table, which has {num_polarizations} rows")]
    UnresolvedPolarization {
        /// The referenced polarization id
        polarization_id: i64,
        /// The number of rows in the POLARIZATION table
        num_polarizations: usize,
    },

    /// The same spectral window appears in more than one grouped record.
    #[error("Spectral window {spectral_window_id} appears more than once in the grouped result ({num_records} records, {num_distinct} distinct windows)")]
    DuplicateSpectralWindow {
        /// The repeated spectral window id
        spectral_window_id: i64,
        /// The number of grouped records
        num_records: usize,
        /// The number of distinct spectral window ids
        num_distinct: usize,
    },

    /// The dataset has no flag points at all.
    #[error("{dataset} contains no flag points")]
    EmptyDataset {
        /// The dataset name
        dataset: String,
    },

    /// The flag cube has a different channel count from the spectral window.
    #[error("Spectral window {spectral_window_id} has {expected} channels, but the flag cube has {found}")]
    ChannelCountMismatch {
        /// The spectral window id
        spectral_window_id: i64,
        /// The number of channels in the SPECTRAL_WINDOW table
        expected: usize,
        /// The number of channels in the flag cube
        found: usize,
    },

    /// The flag cube has a different correlation count from the polarization setup.
    #[error("Spectral window {spectral_window_id} has {expected} correlations, but the flag cube has {found}")]
    CorrelationCountMismatch {
        /// The spectral window id
        spectral_window_id: i64,
        /// The number of correlations in the POLARIZATION table
        expected: usize,
        /// The number of correlations in the flag cube
        found: usize,
    },

    /// Processing was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,

    /// Error derived from [`EngineError`]
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A fatal error for one dataset, with the stage it happened in.
#[derive(Error, Debug)]
#[error("{dataset}: {stage} stage failed: {source}")]
pub struct ReportError {
    /// The dataset being processed
    pub dataset: String,
    /// The stage which failed
    pub stage: Stage,
    /// The underlying error
    pub source: StatsError,
}

#[derive(Error, Debug)]
/// Errors relating to CLI invocation
pub enum CLIError {
    /// When a bad CLI argument is provided
    #[error("Invalid Command Line Argument {option}\nexpected: {expected}\nreceived: {received}")]
    InvalidCommandLineArgument {
        /// The argument name within the clap parser
        option: String,
        /// The expected value
        expected: String,
        /// The received value
        received: String,
    },
}

#[derive(Error, Debug)]
/// The top level error of msflagstats
pub enum FlagStatsError {
    /// Error derived from [`ReportError`]
    #[error(transparent)]
    Report(#[from] ReportError),

    /// Error derived from [`EngineError`]
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[cfg(feature = "cli")]
    /// Error derived from [`clap::Error`]
    #[error(transparent)]
    ClapError(#[from] clap::Error),

    /// Error derived from [`CLIError`]
    #[error(transparent)]
    CLIError(#[from] CLIError),

    /// A dry run was requested, nothing was processed.
    #[error("Dry run")]
    DryRun {},

    /// Neither a base directory nor any dataset was given.
    #[error("No base directory or measurement sets given")]
    NoDatasetsGiven,

    /// The base directory could not be listed.
    #[error("Base directory {0} does not exist or is not a directory")]
    BadBaseDir(PathBuf),

    /// No measurement sets were found in the base directory.
    #[error("No measurement sets found in {0}")]
    NoDatasetsFound(PathBuf),

    /// The selection did not match any measurement set.
    #[error("None of the selected numbers {selection:?} match the {num_available} measurement sets available")]
    NoDatasetsSelected {
        /// The requested 1-based numbers
        selection: Vec<usize>,
        /// How many datasets were available
        num_available: usize,
    },

    /// One or more datasets of a batch failed.
    #[error("{num_failed} of {num_datasets} datasets failed")]
    BatchFailed {
        /// The number of datasets which failed
        num_failed: usize,
        /// The number of datasets in the batch
        num_datasets: usize,
    },

    /// Error derived from [`glob::PatternError`]
    #[error(transparent)]
    Glob(#[from] glob::PatternError),

    /// Error derived from [`std::io::Error`]
    #[error(transparent)]
    IO(#[from] std::io::Error),
}
