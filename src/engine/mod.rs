//! The interface to the table storage and grouped-query engine.
//!
//! The statistics code never scans visibility rows itself (apart from the
//! single full-column count done by [`crate::global`]). Instead it describes
//! what it wants as a typed [`GroupRequest`] and hands that to a [`VisTable`],
//! which returns one [`GroupRecord`] per distinct key.
//!
//! Two engines are provided:
//! - [`MemoryTable`], an in-memory dataset for tests, benchmarks and demos.
//! - [`MsTable`], a casacore measurement set read through `rubbl_casatables`.
//!
//! # Examples
//!
//! ```rust
//! use msflagstats::{
//!     engine::{Column, GroupRequestBuilder, MemoryTable, RowPredicate, VisRow, VisTable},
//!     ndarray::Array2,
//! };
//!
//! let mut table = MemoryTable::new("example.ms");
//! table.push_row(VisRow::new(0, 1, 1, Array2::from_elem((4, 2), true)));
//! table.push_row(VisRow::new(0, 0, 1, Array2::from_elem((4, 2), false)));
//!
//! let request = GroupRequestBuilder::default()
//!     .group_keys(vec![Column::Antenna1, Column::Antenna2])
//!     .predicate(RowPredicate::cross_correlations())
//!     .build()
//!     .unwrap();
//!
//! let records = table.group_by_count(&request).unwrap();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].counts.totals(), (8, 0));
//! ```

pub mod error;
pub mod memory;
pub mod ms;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use derive_builder::Builder;

pub use self::{
    error::EngineError,
    memory::{MemoryTable, VisRow},
    ms::MsTable,
};
use crate::ndarray::{Array2, ArrayView2};

/// A column of the main visibility table which can be used in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// `ANTENNA1`
    Antenna1,
    /// `ANTENNA2`
    Antenna2,
    /// `SCAN_NUMBER`
    ScanNumber,
    /// `FIELD_ID`
    FieldId,
    /// `DATA_DESC_ID`
    DataDescId,
    /// `FLAG`, the per-row boolean cube of shape (channels, correlations)
    Flag,
}

impl Column {
    /// The casacore name of this column.
    pub const fn name(self) -> &'static str {
        match self {
            Column::Antenna1 => "ANTENNA1",
            Column::Antenna2 => "ANTENNA2",
            Column::ScanNumber => "SCAN_NUMBER",
            Column::FieldId => "FIELD_ID",
            Column::DataDescId => "DATA_DESC_ID",
            Column::Flag => "FLAG",
        }
    }

    /// Whether this is an integer scalar column, usable as a group key.
    pub const fn is_key(self) -> bool {
        !matches!(self, Column::Flag)
    }

    /// Whether this is a boolean column which can be counted.
    pub const fn is_bool(self) -> bool {
        matches!(self, Column::Flag)
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The integer key values of a single row, used to evaluate predicates and
/// build group keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowKeys {
    /// `ANTENNA1`
    pub antenna1: i32,
    /// `ANTENNA2`
    pub antenna2: i32,
    /// `SCAN_NUMBER`
    pub scan_number: i32,
    /// `FIELD_ID`
    pub field_id: i32,
    /// `DATA_DESC_ID`
    pub data_desc_id: i32,
}

impl RowKeys {
    /// The value of a key column in this row, `None` for non-key columns.
    pub fn get(&self, column: Column) -> Option<i64> {
        match column {
            Column::Antenna1 => Some(self.antenna1 as i64),
            Column::Antenna2 => Some(self.antenna2 as i64),
            Column::ScanNumber => Some(self.scan_number as i64),
            Column::FieldId => Some(self.field_id as i64),
            Column::DataDescId => Some(self.data_desc_id as i64),
            Column::Flag => None,
        }
    }

    fn group_key(&self, columns: &[Column]) -> Vec<i64> {
        columns.iter().filter_map(|&c| self.get(c)).collect()
    }
}

/// A row filter applied before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowPredicate {
    /// Every row.
    #[default]
    All,
    /// Rows where the two key columns hold different values.
    ColumnsDiffer(Column, Column),
}

impl RowPredicate {
    /// `ANTENNA1 != ANTENNA2`, which excludes self-correlations.
    pub const fn cross_correlations() -> Self {
        RowPredicate::ColumnsDiffer(Column::Antenna1, Column::Antenna2)
    }

    /// Whether a row satisfies this predicate.
    pub fn matches(&self, row: &RowKeys) -> bool {
        match *self {
            RowPredicate::All => true,
            RowPredicate::ColumnsDiffer(a, b) => row.get(a) != row.get(b),
        }
    }

    /// The key columns this predicate needs to read.
    pub fn columns(&self) -> Vec<Column> {
        match *self {
            RowPredicate::All => vec![],
            RowPredicate::ColumnsDiffer(a, b) => vec![a, b],
        }
    }
}

impl Display for RowPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowPredicate::All => write!(f, "all rows"),
            RowPredicate::ColumnsDiffer(a, b) => write!(f, "{a} != {b}"),
        }
    }
}

/// How the boolean cube of each row is reduced before summing over a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// One true/false count per group.
    #[default]
    Total,
    /// One true/false count per (channel, correlation) cell per group.
    PerCell,
}

/// A grouped boolean-count request: for rows matching `predicate`, grouped by
/// `group_keys`, count the true and false values of `bool_column`.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct GroupRequest {
    /// Columns whose values make up the group key, in order.
    pub group_keys: Vec<Column>,
    /// Row filter applied before grouping
    #[builder(default)]
    pub predicate: RowPredicate,
    /// The boolean column to count
    #[builder(default = "Column::Flag")]
    pub bool_column: Column,
    /// How each row's cube is reduced
    #[builder(default)]
    pub reduction: Reduction,
}

impl GroupRequestBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(keys) = &self.group_keys {
            if let Some(bad) = keys.iter().find(|c| !c.is_key()) {
                return Err(format!("{bad} can not be used as a group key"));
            }
            if keys.iter().collect::<BTreeSet<_>>().len() != keys.len() {
                return Err(format!("repeated group key in {keys:?}"));
            }
        }
        if let Some(column) = self.bool_column {
            if !column.is_bool() {
                return Err(format!("{column} is not a boolean column"));
            }
        }
        if let Some(predicate) = &self.predicate {
            if let Some(bad) = predicate.columns().into_iter().find(|c| !c.is_key()) {
                return Err(format!("{bad} can not be used in a row predicate"));
            }
        }
        Ok(())
    }
}

impl GroupRequest {
    /// All key columns the engine needs to read to execute this request.
    pub fn key_columns(&self) -> BTreeSet<Column> {
        self.group_keys
            .iter()
            .copied()
            .chain(self.predicate.columns())
            .collect()
    }
}

impl Display for GroupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self
            .group_keys
            .iter()
            .map(|c| c.name())
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "count {} where {} groupby [{}] ({:?})",
            self.bool_column, self.predicate, keys, self.reduction
        )
    }
}

/// The true/false counts of a single group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCounts {
    /// Summed over every cell of every row in the group.
    Total {
        /// number of true values
        count_true: u64,
        /// number of false values
        count_false: u64,
    },
    /// Summed over rows only; shape (channels, correlations).
    PerCell {
        /// number of true values per cell
        count_true: Array2<u64>,
        /// number of false values per cell
        count_false: Array2<u64>,
    },
}

impl GroupCounts {
    /// `(count_true, count_false)` summed over all cells.
    pub fn totals(&self) -> (u64, u64) {
        match self {
            GroupCounts::Total {
                count_true,
                count_false,
            } => (*count_true, *count_false),
            GroupCounts::PerCell {
                count_true,
                count_false,
            } => (count_true.sum(), count_false.sum()),
        }
    }
}

/// One output record of a grouped request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    /// Values of the group key columns, in request order
    pub keys: Vec<i64>,
    /// The counts of this group
    pub counts: GroupCounts,
}

/// The metadata subtables of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubTable {
    /// `ANTENNA`
    Antenna,
    /// `FIELD`
    Field,
    /// `DATA_DESCRIPTION`
    DataDescription,
    /// `SPECTRAL_WINDOW`
    SpectralWindow,
    /// `POLARIZATION`
    Polarization,
}

impl SubTable {
    /// The casacore name of this subtable.
    pub const fn name(self) -> &'static str {
        match self {
            SubTable::Antenna => "ANTENNA",
            SubTable::Field => "FIELD",
            SubTable::DataDescription => "DATA_DESCRIPTION",
            SubTable::SpectralWindow => "SPECTRAL_WINDOW",
            SubTable::Polarization => "POLARIZATION",
        }
    }
}

/// An open, read-only visibility dataset.
///
/// Implementors execute grouped counts however they like; callers only rely
/// on the records being returned in ascending key order, and on an empty
/// result (not an error) when no rows match.
pub trait VisTable: Sync {
    /// An identifier for this dataset, used in logs and errors.
    fn name(&self) -> &str;

    /// The column names of the main table.
    ///
    /// # Errors
    ///
    /// Engine specific read errors.
    fn column_names(&self) -> Result<BTreeSet<String>, EngineError>;

    /// The number of rows in the main table.
    ///
    /// # Errors
    ///
    /// Engine specific read errors.
    fn row_count(&self) -> Result<u64, EngineError>;

    /// Execute a grouped boolean count.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MissingColumn`] if a requested column is absent
    /// - [`EngineError::ShapeMismatch`] for [`Reduction::PerCell`] requests
    ///   whose groups mix cube shapes
    fn group_by_count(&self, request: &GroupRequest) -> Result<Vec<GroupRecord>, EngineError>;

    /// Visit the flag cube of every row of the main table, in row order.
    ///
    /// # Errors
    ///
    /// Engine specific read errors.
    fn for_each_flag_cube(
        &self,
        visitor: &mut dyn FnMut(ArrayView2<bool>),
    ) -> Result<(), EngineError>;

    /// Read a string column of a subtable, indexed by row.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingSubtable`] or [`EngineError::MissingColumn`].
    fn read_strings(&self, table: SubTable, column: &str) -> Result<Vec<String>, EngineError>;

    /// Read an integer column of a subtable, indexed by row.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingSubtable`] or [`EngineError::MissingColumn`].
    fn read_ints(&self, table: SubTable, column: &str) -> Result<Vec<i32>, EngineError>;

    /// Read a float array column of a subtable, one vector per row.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingSubtable`] or [`EngineError::MissingColumn`].
    fn read_float_arrays(
        &self,
        table: SubTable,
        column: &str,
    ) -> Result<Vec<Vec<f64>>, EngineError>;

    /// Read an integer array column of a subtable, one vector per row.
    ///
    /// # Errors
    ///
    /// [`EngineError::MissingSubtable`] or [`EngineError::MissingColumn`].
    fn read_int_arrays(&self, table: SubTable, column: &str)
        -> Result<Vec<Vec<i32>>, EngineError>;
}

/// Sums rows into groups. Shared by the engines in this module.
pub(crate) struct GroupAccumulator<'a> {
    request: &'a GroupRequest,
    groups: BTreeMap<Vec<i64>, GroupCounts>,
}

impl<'a> GroupAccumulator<'a> {
    pub(crate) fn new(request: &'a GroupRequest) -> Self {
        Self {
            request,
            groups: BTreeMap::new(),
        }
    }

    /// Add one row. Rows failing the predicate are ignored.
    pub(crate) fn add(
        &mut self,
        row_idx: u64,
        row: &RowKeys,
        cube: ArrayView2<bool>,
    ) -> Result<(), EngineError> {
        if !self.request.predicate.matches(row) {
            return Ok(());
        }
        let keys = row.group_key(&self.request.group_keys);
        match self.request.reduction {
            Reduction::Total => {
                let num_true = cube.iter().filter(|&&f| f).count() as u64;
                let num_false = cube.len() as u64 - num_true;
                let entry = self
                    .groups
                    .entry(keys)
                    .or_insert_with(|| GroupCounts::Total {
                        count_true: 0,
                        count_false: 0,
                    });
                if let GroupCounts::Total {
                    count_true,
                    count_false,
                } = entry
                {
                    *count_true += num_true;
                    *count_false += num_false;
                }
            }
            Reduction::PerCell => {
                let shape = cube.dim();
                let entry = self
                    .groups
                    .entry(keys.clone())
                    .or_insert_with(|| GroupCounts::PerCell {
                        count_true: Array2::zeros(shape),
                        count_false: Array2::zeros(shape),
                    });
                if let GroupCounts::PerCell {
                    count_true,
                    count_false,
                } = entry
                {
                    if count_true.dim() != shape {
                        return Err(EngineError::ShapeMismatch {
                            keys,
                            row: row_idx,
                            expected: count_true.dim(),
                            found: shape,
                        });
                    }
                    count_true.zip_mut_with(&cube, |n, &f| *n += f as u64);
                    count_false.zip_mut_with(&cube, |n, &f| *n += !f as u64);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Vec<GroupRecord> {
        self.groups
            .into_iter()
            .map(|(keys, counts)| GroupRecord { keys, counts })
            .collect()
    }
}
