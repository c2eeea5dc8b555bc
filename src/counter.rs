//! Typed grouped-count requests issued against a [`VisTable`].

use log::debug;

use crate::{
    engine::{
        Column, EngineError, GroupRecord, GroupRequest, GroupRequestBuilder, Reduction,
        RowPredicate, VisTable,
    },
    error::StatsError,
};

/// Issues grouped boolean-count requests against a table.
pub struct GroupedCounter<'a, T: VisTable + ?Sized> {
    table: &'a T,
}

impl<'a, T: VisTable + ?Sized> GroupedCounter<'a, T> {
    /// Create a counter for `table`.
    pub fn new(table: &'a T) -> Self {
        Self { table }
    }

    /// For rows matching `predicate`, grouped by `group_keys`, count the true
    /// and false values of `bool_column`. One record per group, ascending
    /// by key.
    ///
    /// # Errors
    ///
    /// [`StatsError::Engine`] if the request is malformed or the engine fails.
    pub fn count_by(
        &self,
        group_keys: &[Column],
        predicate: RowPredicate,
        bool_column: Column,
    ) -> Result<Vec<GroupRecord>, StatsError> {
        self.execute(group_keys, predicate, bool_column, Reduction::Total)
    }

    /// Like [`GroupedCounter::count_by`], but keeps one count per
    /// (channel, correlation) cell.
    ///
    /// # Errors
    ///
    /// [`StatsError::Engine`] if the request is malformed, the engine fails,
    /// or a group mixes flag cube shapes.
    pub fn count_cells_by(
        &self,
        group_keys: &[Column],
        predicate: RowPredicate,
        bool_column: Column,
    ) -> Result<Vec<GroupRecord>, StatsError> {
        self.execute(group_keys, predicate, bool_column, Reduction::PerCell)
    }

    /// Flag counts per cross-correlation baseline, keyed by
    /// `[ANTENNA1, ANTENNA2]`.
    ///
    /// # Errors
    ///
    /// See [`GroupedCounter::count_by`].
    pub fn per_baseline(&self) -> Result<Vec<GroupRecord>, StatsError> {
        self.count_by(
            &[Column::Antenna1, Column::Antenna2],
            RowPredicate::cross_correlations(),
            Column::Flag,
        )
    }

    /// Cross-correlation flag counts keyed by `[SCAN_NUMBER, FIELD_ID]`.
    ///
    /// # Errors
    ///
    /// See [`GroupedCounter::count_by`].
    pub fn per_scan(&self) -> Result<Vec<GroupRecord>, StatsError> {
        self.count_by(
            &[Column::ScanNumber, Column::FieldId],
            RowPredicate::cross_correlations(),
            Column::Flag,
        )
    }

    /// Cross-correlation per-cell flag counts keyed by `[DATA_DESC_ID]`.
    ///
    /// # Errors
    ///
    /// See [`GroupedCounter::count_cells_by`].
    pub fn per_data_description(&self) -> Result<Vec<GroupRecord>, StatsError> {
        self.count_cells_by(
            &[Column::DataDescId],
            RowPredicate::cross_correlations(),
            Column::Flag,
        )
    }

    fn execute(
        &self,
        group_keys: &[Column],
        predicate: RowPredicate,
        bool_column: Column,
        reduction: Reduction,
    ) -> Result<Vec<GroupRecord>, StatsError> {
        let request: GroupRequest = GroupRequestBuilder::default()
            .group_keys(group_keys.to_vec())
            .predicate(predicate)
            .bool_column(bool_column)
            .reduction(reduction)
            .build()
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        let records = self.table.group_by_count(&request)?;
        debug!(
            "{}: [{}] returned {} groups",
            self.table.name(),
            request,
            records.len()
        );
        Ok(records)
    }
}
