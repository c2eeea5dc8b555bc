//! A casacore measurement set, read through `rubbl_casatables`.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use log::{debug, trace};
use marlu::rubbl_casatables::{Table, TableOpenMode};

use super::{
    Column, EngineError, GroupAccumulator, GroupRecord, GroupRequest, RowKeys, SubTable, VisTable,
};
use crate::ndarray::{Array2, ArrayView2};

/// A read-only handle on a measurement set directory.
///
/// Tables are opened for the duration of each call and closed again when the
/// call returns, so a handle holds no casacore resources between requests and
/// can be shared between threads.
#[derive(Debug)]
pub struct MsTable {
    path: PathBuf,
    name: String,
}

impl MsTable {
    /// Open the measurement set at `path`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::BadPath`] if `path` doesn't exist
    /// - [`EngineError::Table`] if casacore can't open the main table
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(EngineError::BadPath(path));
        }
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let main_table = read_table(&path, None)?;
        debug!("opened {} with {} rows", name, main_table.n_rows());
        Ok(Self { path, name })
    }

    /// The path of the measurement set directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn subtable(&self, table: SubTable) -> Result<Table, EngineError> {
        if !self.path.join(table.name()).exists() {
            return Err(EngineError::MissingSubtable {
                dataset: self.name.clone(),
                subtable: table.name(),
            });
        }
        read_table(&self.path, Some(table.name()))
    }

    fn require_columns(
        &self,
        table: &mut Table,
        table_name: &str,
        columns: &[&str],
    ) -> Result<(), EngineError> {
        let present = table.column_names()?;
        match columns.iter().find(|c| !present.iter().any(|p| p == *c)) {
            Some(missing) => Err(EngineError::MissingColumn {
                table: format!("{}/{}", self.name, table_name),
                column: missing.to_string(),
            }),
            None => Ok(()),
        }
    }

    fn subtable_with_column(&self, table: SubTable, column: &str) -> Result<Table, EngineError> {
        let mut sub = self.subtable(table)?;
        self.require_columns(&mut sub, table.name(), &[column])?;
        Ok(sub)
    }
}

impl Drop for MsTable {
    fn drop(&mut self) {
        trace!("closed {}", self.name);
    }
}

/// Open a measurement set table read only. If `table` is `None`, then open the
/// main table.
fn read_table(ms: &Path, table: Option<&str>) -> Result<Table, EngineError> {
    let t = Table::open(
        format!("{}/{}", ms.display(), table.unwrap_or("")),
        TableOpenMode::Read,
    )?;
    Ok(t)
}

/// Read the integer key columns a request needs, one vector per key.
fn read_key_columns(
    main_table: &mut Table,
    columns: &BTreeSet<Column>,
    num_rows: usize,
) -> Result<Vec<(Column, Vec<i32>)>, EngineError> {
    let mut key_columns = Vec::with_capacity(columns.len());
    for &column in columns {
        let values: Vec<i32> = main_table.get_col_as_vec(column.name())?;
        debug_assert_eq!(values.len(), num_rows);
        key_columns.push((column, values));
    }
    Ok(key_columns)
}

fn row_keys(key_columns: &[(Column, Vec<i32>)], row_idx: usize) -> RowKeys {
    let mut keys = RowKeys::default();
    for (column, values) in key_columns {
        let value = values[row_idx];
        match column {
            Column::Antenna1 => keys.antenna1 = value,
            Column::Antenna2 => keys.antenna2 = value,
            Column::ScanNumber => keys.scan_number = value,
            Column::FieldId => keys.field_id = value,
            Column::DataDescId => keys.data_desc_id = value,
            Column::Flag => {}
        }
    }
    keys
}

impl VisTable for MsTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn column_names(&self) -> Result<BTreeSet<String>, EngineError> {
        let mut main_table = read_table(&self.path, None)?;
        Ok(main_table.column_names()?.into_iter().collect())
    }

    fn row_count(&self) -> Result<u64, EngineError> {
        let main_table = read_table(&self.path, None)?;
        Ok(main_table.n_rows())
    }

    fn group_by_count(&self, request: &GroupRequest) -> Result<Vec<GroupRecord>, EngineError> {
        let mut main_table = read_table(&self.path, None)?;
        let key_set = request.key_columns();
        let needed = key_set
            .iter()
            .chain(std::iter::once(&request.bool_column))
            .map(|c| c.name())
            .collect::<Vec<_>>();
        self.require_columns(&mut main_table, "MAIN", &needed)?;

        let num_rows = main_table.n_rows() as usize;
        let key_columns = read_key_columns(&mut main_table, &key_set, num_rows)?;
        let bool_column = request.bool_column.name();

        debug!("{}: {}", self.name, request);
        let mut acc = GroupAccumulator::new(request);
        let mut row_idx = 0;
        let mut accumulate_error = None;
        main_table.for_each_row(|row| {
            if accumulate_error.is_none() {
                let cube: Array2<bool> = row.get_cell(bool_column)?;
                let keys = row_keys(&key_columns, row_idx);
                if let Err(e) = acc.add(row_idx as u64, &keys, cube.view()) {
                    accumulate_error = Some(e);
                }
            }
            row_idx += 1;
            Ok(())
        })?;
        if let Some(e) = accumulate_error {
            return Err(e);
        }
        Ok(acc.finish())
    }

    fn for_each_flag_cube(
        &self,
        visitor: &mut dyn FnMut(ArrayView2<bool>),
    ) -> Result<(), EngineError> {
        let mut main_table = read_table(&self.path, None)?;
        self.require_columns(&mut main_table, "MAIN", &[Column::Flag.name()])?;
        main_table.for_each_row(|row| {
            let cube: Array2<bool> = row.get_cell(Column::Flag.name())?;
            visitor(cube.view());
            Ok(())
        })?;
        Ok(())
    }

    fn read_strings(&self, table: SubTable, column: &str) -> Result<Vec<String>, EngineError> {
        let mut sub = self.subtable_with_column(table, column)?;
        Ok(sub.get_col_as_vec(column)?)
    }

    fn read_ints(&self, table: SubTable, column: &str) -> Result<Vec<i32>, EngineError> {
        let mut sub = self.subtable_with_column(table, column)?;
        Ok(sub.get_col_as_vec(column)?)
    }

    fn read_float_arrays(
        &self,
        table: SubTable,
        column: &str,
    ) -> Result<Vec<Vec<f64>>, EngineError> {
        let mut sub = self.subtable_with_column(table, column)?;
        let mut values = Vec::with_capacity(sub.n_rows() as usize);
        for row_idx in 0..sub.n_rows() {
            values.push(sub.get_cell_as_vec(column, row_idx)?);
        }
        Ok(values)
    }

    fn read_int_arrays(
        &self,
        table: SubTable,
        column: &str,
    ) -> Result<Vec<Vec<i32>>, EngineError> {
        let mut sub = self.subtable_with_column(table, column)?;
        let mut values = Vec::with_capacity(sub.n_rows() as usize);
        for row_idx in 0..sub.n_rows() {
            values.push(sub.get_cell_as_vec(column, row_idx)?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_missing_path() {
        let tmp_dir = tempdir().unwrap();
        let missing = tmp_dir.path().join("missing.ms");
        assert!(matches!(
            MsTable::open(&missing),
            Err(EngineError::BadPath(path)) if path == missing
        ));
    }

    #[test]
    fn test_open_directory_that_is_not_a_table() {
        let tmp_dir = tempdir().unwrap();
        let not_a_table = tmp_dir.path().join("empty.ms");
        std::fs::create_dir(&not_a_table).unwrap();
        assert!(MsTable::open(&not_a_table).is_err());
    }

    #[test]
    fn test_row_keys_only_sets_read_columns() {
        let key_columns = vec![
            (Column::Antenna1, vec![3, 4]),
            (Column::ScanNumber, vec![7, 8]),
        ];
        let keys = row_keys(&key_columns, 1);
        assert_eq!(keys.antenna1, 4);
        assert_eq!(keys.scan_number, 8);
        assert_eq!(keys.antenna2, 0);
    }
}
