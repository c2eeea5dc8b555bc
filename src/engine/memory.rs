//! An in-memory visibility table.

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

use super::{
    EngineError, GroupAccumulator, GroupRecord, GroupRequest, RowKeys, SubTable, VisTable,
};
use crate::{
    constants::MAIN_TABLE_COLUMNS,
    ndarray::{Array2, ArrayView2},
};

/// A single row of an in-memory main table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisRow {
    /// first antenna of the baseline
    pub antenna1: i32,
    /// second antenna of the baseline
    pub antenna2: i32,
    /// scan number
    pub scan_number: i32,
    /// row index into the FIELD table
    pub field_id: i32,
    /// row index into the DATA_DESCRIPTION table
    pub data_desc_id: i32,
    /// flag cube of shape (channels, correlations)
    pub flag: Array2<bool>,
}

impl VisRow {
    /// A row in field 0 and data description 0.
    pub fn new(antenna1: i32, antenna2: i32, scan_number: i32, flag: Array2<bool>) -> Self {
        Self {
            antenna1,
            antenna2,
            scan_number,
            field_id: 0,
            data_desc_id: 0,
            flag,
        }
    }

    /// Set the field id.
    pub fn with_field_id(mut self, field_id: i32) -> Self {
        self.field_id = field_id;
        self
    }

    /// Set the data description id.
    pub fn with_data_desc_id(mut self, data_desc_id: i32) -> Self {
        self.data_desc_id = data_desc_id;
        self
    }

    fn keys(&self) -> RowKeys {
        RowKeys {
            antenna1: self.antenna1,
            antenna2: self.antenna2,
            scan_number: self.scan_number,
            field_id: self.field_id,
            data_desc_id: self.data_desc_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct MemorySubTable {
    strings: BTreeMap<String, Vec<String>>,
    ints: BTreeMap<String, Vec<i32>>,
    float_arrays: BTreeMap<String, Vec<Vec<f64>>>,
    int_arrays: BTreeMap<String, Vec<Vec<i32>>>,
}

/// A visibility dataset held entirely in memory.
///
/// Subtable columns are stored by type, and are built up either with the
/// `set_*` methods or with the `with_*` convenience methods which append one
/// subtable row at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    name: String,
    columns: BTreeSet<String>,
    rows: Vec<VisRow>,
    subtables: BTreeMap<SubTable, MemorySubTable>,
}

impl MemoryTable {
    /// An empty table with the usual main table columns and no subtables.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: MAIN_TABLE_COLUMNS.iter().map(|&c| c.to_string()).collect(),
            rows: vec![],
            subtables: BTreeMap::new(),
        }
    }

    /// Append a row to the main table.
    pub fn push_row(&mut self, row: VisRow) {
        self.rows.push(row);
    }

    /// The rows of the main table.
    pub fn rows(&self) -> &[VisRow] {
        &self.rows
    }

    /// Remove a column from the main table. Row data is kept but can no
    /// longer be read through that column.
    pub fn drop_column(&mut self, column: &str) {
        self.columns.remove(column);
    }

    /// Remove a whole subtable.
    pub fn drop_subtable(&mut self, table: SubTable) {
        self.subtables.remove(&table);
    }

    /// Replace a string column of a subtable.
    pub fn set_string_column(&mut self, table: SubTable, column: &str, values: Vec<String>) {
        self.subtable_mut(table)
            .strings
            .insert(column.to_string(), values);
    }

    /// Replace an integer column of a subtable.
    pub fn set_int_column(&mut self, table: SubTable, column: &str, values: Vec<i32>) {
        self.subtable_mut(table).ints.insert(column.to_string(), values);
    }

    /// Replace a float array column of a subtable.
    pub fn set_float_array_column(&mut self, table: SubTable, column: &str, values: Vec<Vec<f64>>) {
        self.subtable_mut(table)
            .float_arrays
            .insert(column.to_string(), values);
    }

    /// Replace an integer array column of a subtable.
    pub fn set_int_array_column(&mut self, table: SubTable, column: &str, values: Vec<Vec<i32>>) {
        self.subtable_mut(table)
            .int_arrays
            .insert(column.to_string(), values);
    }

    /// Set the ANTENNA table from a list of names.
    pub fn with_antennas<S: ToString>(mut self, names: &[S]) -> Self {
        let names = names.iter().map(ToString::to_string).collect();
        self.set_string_column(SubTable::Antenna, "NAME", names);
        self
    }

    /// Set the FIELD table from a list of names.
    pub fn with_fields<S: ToString>(mut self, names: &[S]) -> Self {
        let names = names.iter().map(ToString::to_string).collect();
        self.set_string_column(SubTable::Field, "NAME", names);
        self
    }

    /// Append a row to the SPECTRAL_WINDOW table.
    pub fn with_spectral_window(
        mut self,
        name: &str,
        channel_freq: Vec<f64>,
        channel_width: Vec<f64>,
    ) -> Self {
        let spw = self.subtable_mut(SubTable::SpectralWindow);
        spw.strings
            .entry("NAME".to_string())
            .or_default()
            .push(name.to_string());
        spw.float_arrays
            .entry("CHAN_FREQ".to_string())
            .or_default()
            .push(channel_freq);
        spw.float_arrays
            .entry("CHAN_WIDTH".to_string())
            .or_default()
            .push(channel_width);
        self
    }

    /// Append a row to the POLARIZATION table.
    pub fn with_polarization(mut self, corr_types: Vec<i32>) -> Self {
        self.subtable_mut(SubTable::Polarization)
            .int_arrays
            .entry("CORR_TYPE".to_string())
            .or_default()
            .push(corr_types);
        self
    }

    /// Append a row to the DATA_DESCRIPTION table.
    pub fn with_data_description(mut self, spectral_window_id: i32, polarization_id: i32) -> Self {
        let dd = self.subtable_mut(SubTable::DataDescription);
        dd.ints
            .entry("SPECTRAL_WINDOW_ID".to_string())
            .or_default()
            .push(spectral_window_id);
        dd.ints
            .entry("POLARIZATION_ID".to_string())
            .or_default()
            .push(polarization_id);
        self
    }

    fn subtable_mut(&mut self, table: SubTable) -> &mut MemorySubTable {
        self.subtables.entry(table).or_default()
    }

    fn subtable(&self, table: SubTable) -> Result<&MemorySubTable, EngineError> {
        self.subtables
            .get(&table)
            .ok_or_else(|| EngineError::MissingSubtable {
                dataset: self.name.clone(),
                subtable: table.name(),
            })
    }

    fn require_column(&self, column: &str) -> Result<(), EngineError> {
        if self.columns.contains(column) {
            Ok(())
        } else {
            Err(EngineError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
        }
    }

    fn missing_subtable_column(&self, table: SubTable, column: &str) -> EngineError {
        EngineError::MissingColumn {
            table: format!("{}/{}", self.name, table.name()),
            column: column.to_string(),
        }
    }
}

impl VisTable for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_names(&self) -> Result<BTreeSet<String>, EngineError> {
        Ok(self.columns.clone())
    }

    fn row_count(&self) -> Result<u64, EngineError> {
        Ok(self.rows.len() as u64)
    }

    fn group_by_count(&self, request: &GroupRequest) -> Result<Vec<GroupRecord>, EngineError> {
        for column in request.key_columns() {
            self.require_column(column.name())?;
        }
        self.require_column(request.bool_column.name())?;

        let mut acc = GroupAccumulator::new(request);
        for (row_idx, row) in self.rows.iter().enumerate() {
            acc.add(row_idx as u64, &row.keys(), row.flag.view())?;
        }
        let records = acc.finish();
        trace!("{}: {} -> {} records", self.name, request, records.len());
        Ok(records)
    }

    fn for_each_flag_cube(
        &self,
        visitor: &mut dyn FnMut(ArrayView2<bool>),
    ) -> Result<(), EngineError> {
        self.require_column("FLAG")?;
        for row in &self.rows {
            visitor(row.flag.view());
        }
        Ok(())
    }

    fn read_strings(&self, table: SubTable, column: &str) -> Result<Vec<String>, EngineError> {
        self.subtable(table)?
            .strings
            .get(column)
            .cloned()
            .ok_or_else(|| self.missing_subtable_column(table, column))
    }

    fn read_ints(&self, table: SubTable, column: &str) -> Result<Vec<i32>, EngineError> {
        self.subtable(table)?
            .ints
            .get(column)
            .cloned()
            .ok_or_else(|| self.missing_subtable_column(table, column))
    }

    fn read_float_arrays(
        &self,
        table: SubTable,
        column: &str,
    ) -> Result<Vec<Vec<f64>>, EngineError> {
        self.subtable(table)?
            .float_arrays
            .get(column)
            .cloned()
            .ok_or_else(|| self.missing_subtable_column(table, column))
    }

    fn read_int_arrays(
        &self,
        table: SubTable,
        column: &str,
    ) -> Result<Vec<Vec<i32>>, EngineError> {
        self.subtable(table)?
            .int_arrays
            .get(column)
            .cloned()
            .ok_or_else(|| self.missing_subtable_column(table, column))
    }
}
