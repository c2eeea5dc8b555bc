//! Errors that can occur while talking to a table engine

use std::path::PathBuf;

use marlu::rubbl_casatables;
use thiserror::Error;

#[derive(Error, Debug)]
/// All the errors that can occur when reading tables or executing grouped counts
pub enum EngineError {
    /// The dataset path could not be found.
    #[error("Supplied path {0} does not exist or is not readable!")]
    BadPath(PathBuf),

    /// A metadata subtable is not present in the dataset.
    #[error("Subtable {subtable} is not present in {dataset}")]
    MissingSubtable {
        /// The dataset the subtable was looked up in
        dataset: String,
        /// The name of the missing subtable
        subtable: &'static str,
    },

    /// A column is not present in a table.
    #[error("Column {column} is not present in table {table}")]
    MissingColumn {
        /// The table which was searched
        table: String,
        /// The missing column
        column: String,
    },

    /// A grouped request could not be built or is not supported.
    #[error("Invalid grouped request: {0}")]
    InvalidRequest(String),

    /// Two rows in the same group have differently shaped flag cubes, so their
    /// per-cell counts cannot be summed.
    #[error("Row {row} of group {keys:?} has a flag cube of shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        /// The group key values
        keys: Vec<i64>,
        /// The row index of the offending row
        row: u64,
        /// The shape of the first cube seen for this group
        expected: (usize, usize),
        /// The shape of the offending cube
        found: (usize, usize),
    },

    /// Error from the casacore table interface
    #[error("Error when trying to interface with measurement set: {0}")]
    Table(#[from] rubbl_casatables::TableError),

    /// Error from casacore
    #[error("Error from casacore: {0}")]
    Casacore(#[from] rubbl_casatables::CasacoreError),
}
