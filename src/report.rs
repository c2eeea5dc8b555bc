//! Assembling every statistic of a dataset into one report.

use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use derive_builder::Builder;
use log::{debug, info, warn};

use crate::{
    channel::{per_channel_tables, ChannelTable},
    engine::{Column, VisTable},
    error::{ReportError, Stage, StatsError},
    fold::per_antenna_stats,
    global::{global_outcome, GlobalOutcome},
    histogram::{assemble_histogram, HistogramSeries},
    metadata::DatasetMetadata,
    rayon,
    scan::{per_scan_stats, scan_total},
    stats::{AntennaStat, FlagCounts, ScanStat},
    with_increment_duration,
};

/// A cancellation signal shared between a caller and the report assembler.
///
/// It is checked between stages only; a grouped count which has started
/// always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag which is not yet cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for assembling a [`DatasetFlagReport`]
#[derive(Builder, Debug, Clone)]
pub struct ReportContext {
    /// Whether per-antenna statistics are computed
    #[builder(default = "true")]
    pub per_antenna: bool,
    /// Whether per-scan statistics are computed
    #[builder(default = "true")]
    pub per_scan: bool,
    /// Whether per-channel statistics and the histogram are computed
    #[builder(default = "true")]
    pub per_channel: bool,
    /// Whether the global statistic is computed
    #[builder(default = "true")]
    pub global: bool,
    /// Whether the independent stages run in parallel
    #[builder(default = "false")]
    pub parallel_stages: bool,
    /// Checked between stages
    #[builder(default)]
    pub cancel: Option<CancelFlag>,
}

impl Default for ReportContext {
    fn default() -> Self {
        Self {
            per_antenna: true,
            per_scan: true,
            per_channel: true,
            global: true,
            parallel_stages: false,
            cancel: None,
        }
    }
}

impl Display for ReportContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (enabled, what) in [
            (self.per_antenna, "per-antenna statistics"),
            (self.per_scan, "per-scan statistics"),
            (self.per_channel, "per-channel statistics"),
            (self.global, "the global flag fraction"),
        ] {
            writeln!(
                f,
                "{} compute {}.",
                if enabled { "Will" } else { "Will not" },
                what
            )?;
        }
        writeln!(
            f,
            "{} run stages in parallel.",
            if self.parallel_stages {
                "Will"
            } else {
                "Will not"
            }
        )?;
        Ok(())
    }
}

impl ReportContext {
    fn needs_metadata(&self) -> bool {
        self.per_antenna || self.per_scan || self.per_channel
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelFlag::is_cancelled)
    }
}

/// The flag statistics of a dataset. Stages which were not requested are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlagStatistics {
    /// per-antenna statistics, ascending by antenna id
    pub antennas: Option<Vec<AntennaStat>>,
    /// per-scan statistics, ascending by scan number
    pub scans: Option<Vec<ScanStat>>,
    /// sum over all scans
    pub scan_total: Option<FlagCounts>,
    /// per-channel tables, ascending by spectral window id
    pub channels: Option<Vec<ChannelTable>>,
    /// cross-window histogram series
    pub histogram: Option<HistogramSeries>,
    /// single ratio over the whole flag column, or why there is none
    pub global: Option<GlobalOutcome>,
}

/// Everything known about the flags of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetFlagReport {
    /// dataset name
    pub dataset: String,
    /// number of rows in the main table
    pub row_count: u64,
    /// column names of the main table, sorted
    pub column_names: Vec<String>,
    /// `None` when the main table has no FLAG column
    pub flag_stats: Option<FlagStatistics>,
}

fn run_stage<R>(
    dataset: &str,
    stage: Stage,
    enabled: bool,
    ctx: &ReportContext,
    body: impl FnOnce() -> Result<R, StatsError>,
) -> Result<Option<R>, ReportError> {
    if !enabled {
        debug!("{}: skipping {} stage", dataset, stage);
        return Ok(None);
    }
    let fail = |source| ReportError {
        dataset: dataset.to_string(),
        stage,
        source,
    };
    if ctx.is_cancelled() {
        return Err(fail(StatsError::Cancelled));
    }
    info!("{}: {} stage start", dataset, stage);
    let start = Instant::now();
    let result = with_increment_duration!(stage.name(), body());
    info!(
        "{}: {} stage end after {:?}",
        dataset,
        stage,
        start.elapsed()
    );
    result.map(Some).map_err(fail)
}

type StageResult<R> = Result<Option<R>, ReportError>;

fn run_counting_stages<T: VisTable + ?Sized>(
    table: &T,
    metadata: &DatasetMetadata,
    ctx: &ReportContext,
) -> (
    StageResult<Vec<AntennaStat>>,
    StageResult<Vec<ScanStat>>,
    StageResult<Vec<ChannelTable>>,
    StageResult<GlobalOutcome>,
) {
    let dataset = table.name();
    let antennas = || {
        run_stage(dataset, Stage::PerAntenna, ctx.per_antenna, ctx, || {
            per_antenna_stats(table, metadata)
        })
    };
    let scans = || {
        run_stage(dataset, Stage::PerScan, ctx.per_scan, ctx, || {
            per_scan_stats(table, metadata)
        })
    };
    let channels = || {
        run_stage(dataset, Stage::PerChannel, ctx.per_channel, ctx, || {
            per_channel_tables(table, metadata)
        })
    };
    let global = || {
        run_stage(dataset, Stage::Global, ctx.global, ctx, || {
            global_outcome(table)
        })
    };

    if ctx.parallel_stages {
        let ((antennas, scans), (channels, global)) = rayon::join(
            || rayon::join(antennas, scans),
            || rayon::join(channels, global),
        );
        (antennas, scans, channels, global)
    } else {
        let antennas = antennas();
        if antennas.is_err() {
            return (antennas, Ok(None), Ok(None), Ok(None));
        }
        let scans = scans();
        if scans.is_err() {
            return (antennas, scans, Ok(None), Ok(None));
        }
        let channels = channels();
        if channels.is_err() {
            return (antennas, scans, channels, Ok(None));
        }
        (antennas, scans, channels, global())
    }
}

/// Compute every requested statistic of `table`.
///
/// A dataset without a FLAG column gives a report with no flag statistics.
///
/// # Errors
///
/// Any stage failure aborts the whole report with a [`ReportError`] naming
/// the dataset and the stage, including [`StatsError::Cancelled`] if
/// `ctx.cancel` was set. A dataset with no flag points is not a failure: its
/// grouped statistics are empty and `global` holds [`GlobalOutcome::Empty`].
pub fn assemble_report<T: VisTable + ?Sized>(
    table: &T,
    ctx: &ReportContext,
) -> Result<DatasetFlagReport, ReportError> {
    let dataset = table.name();

    let (row_count, column_names) = run_stage(dataset, Stage::Inventory, true, ctx, || {
        let column_names = table.column_names()?;
        let row_count = table.row_count()?;
        Ok((row_count, column_names))
    })?
    .unwrap_or_default();
    info!("{}: {} rows", dataset, row_count);
    debug!("{}: columns {:?}", dataset, column_names);
    let has_flag = column_names.contains(Column::Flag.name());
    let column_names = column_names.into_iter().collect::<Vec<_>>();

    if !has_flag {
        warn!("{}: no FLAG column, skipping flag statistics", dataset);
        return Ok(DatasetFlagReport {
            dataset: dataset.to_string(),
            row_count,
            column_names,
            flag_stats: None,
        });
    }

    let metadata = run_stage(dataset, Stage::Metadata, ctx.needs_metadata(), ctx, || {
        DatasetMetadata::from_table(table)
    })?
    .unwrap_or_default();

    let (antennas, scans, channels, global) = run_counting_stages(table, &metadata, ctx);
    let antennas = antennas?;
    let scans = scans?;
    let channels = channels?;
    let global = global?;

    let histogram = match &channels {
        Some(tables) => run_stage(dataset, Stage::Histogram, true, ctx, || {
            Ok(assemble_histogram(tables))
        })?,
        None => None,
    };
    let scan_total = scans.as_deref().map(scan_total);

    Ok(DatasetFlagReport {
        dataset: dataset.to_string(),
        row_count,
        column_names,
        flag_stats: Some(FlagStatistics {
            antennas,
            scans,
            scan_total,
            channels,
            histogram,
            global,
        }),
    })
}
