//! A single flagged fraction over the whole flag column.

use log::{debug, warn};

use crate::{engine::VisTable, error::StatsError, stats::GlobalStat};

/// What the global stage of a report found.
///
/// An empty dataset fails the global count but not the report, so it is kept
/// here next to the other stages' results.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalOutcome {
    /// the flagged fraction
    Computed(GlobalStat),
    /// the dataset has no flag points
    Empty {
        /// the dataset name
        dataset: String,
    },
}

impl GlobalOutcome {
    /// The statistic, if there was anything to count.
    pub fn stat(&self) -> Option<&GlobalStat> {
        match self {
            GlobalOutcome::Computed(stat) => Some(stat),
            GlobalOutcome::Empty { .. } => None,
        }
    }

    /// The statistic, or the [`StatsError::EmptyDataset`] the count raised.
    ///
    /// # Errors
    ///
    /// [`StatsError::EmptyDataset`] if the dataset has no flag points.
    pub fn into_result(self) -> Result<GlobalStat, StatsError> {
        match self {
            GlobalOutcome::Computed(stat) => Ok(stat),
            GlobalOutcome::Empty { dataset } => Err(StatsError::EmptyDataset { dataset }),
        }
    }
}

/// Count every flag of every row, self-correlations included.
///
/// The denominator is rows × channels × correlations of the first row, so
/// rows are assumed to share one flag cube shape.
///
/// # Errors
///
/// - [`StatsError::EmptyDataset`] if there are no flag points
/// - [`StatsError::Engine`] if the flag column can't be read
pub fn global_stat<T: VisTable + ?Sized>(table: &T) -> Result<GlobalStat, StatsError> {
    let mut num_rows: u64 = 0;
    let mut first_shape: Option<(usize, usize)> = None;
    let mut flagged_points: u64 = 0;
    table.for_each_flag_cube(&mut |cube| {
        num_rows += 1;
        first_shape.get_or_insert(cube.dim());
        flagged_points += cube.iter().filter(|&&f| f).count() as u64;
    })?;

    let (num_chans, num_corrs) = first_shape.unwrap_or_default();
    let total_points = num_rows * num_chans as u64 * num_corrs as u64;
    debug!(
        "{}: {} rows x {} channels x {} correlations, {} flagged",
        table.name(),
        num_rows,
        num_chans,
        num_corrs,
        flagged_points
    );
    if total_points == 0 {
        return Err(StatsError::EmptyDataset {
            dataset: table.name().to_string(),
        });
    }
    Ok(GlobalStat {
        flagged_points,
        total_points,
        percentage: 100.0 * flagged_points as f64 / total_points as f64,
    })
}

/// Like [`global_stat`], but an empty dataset is an [`GlobalOutcome::Empty`]
/// rather than an error.
///
/// # Errors
///
/// [`StatsError::Engine`] if the flag column can't be read.
pub fn global_outcome<T: VisTable + ?Sized>(table: &T) -> Result<GlobalOutcome, StatsError> {
    match global_stat(table) {
        Ok(stat) => Ok(GlobalOutcome::Computed(stat)),
        Err(StatsError::EmptyDataset { dataset }) => {
            warn!("{}: no flag points, no global flag fraction", dataset);
            Ok(GlobalOutcome::Empty { dataset })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{MemoryTable, VisRow},
        ndarray::Array2,
        test_common::get_global_scenario_table,
    };
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_global_scenario() {
        let table = get_global_scenario_table();
        let stat = global_stat(&table).unwrap();
        assert_eq!(stat.flagged_points, 50);
        assert_eq!(stat.total_points, 800);
        assert_abs_diff_eq!(stat.percentage, 6.25);
    }

    #[test]
    fn test_global_includes_autos() {
        let mut table = MemoryTable::new("autos.ms");
        table.push_row(VisRow::new(0, 0, 1, Array2::from_elem((2, 2), true)));
        table.push_row(VisRow::new(0, 1, 1, Array2::from_elem((2, 2), false)));
        let stat = global_stat(&table).unwrap();
        assert_eq!(stat.flagged_points, 4);
        assert_eq!(stat.total_points, 8);
    }

    #[test]
    fn test_empty_dataset() {
        let table = MemoryTable::new("empty.ms");
        assert!(matches!(
            global_stat(&table),
            Err(StatsError::EmptyDataset { dataset }) if dataset == "empty.ms"
        ));
    }

    #[test]
    fn test_empty_outcome_keeps_the_error() {
        let outcome = global_outcome(&MemoryTable::new("empty.ms")).unwrap();
        assert_eq!(
            outcome,
            GlobalOutcome::Empty {
                dataset: "empty.ms".into()
            }
        );
        assert!(outcome.stat().is_none());
        assert!(matches!(
            outcome.into_result(),
            Err(StatsError::EmptyDataset { dataset }) if dataset == "empty.ms"
        ));

        let outcome = global_outcome(&get_global_scenario_table()).unwrap();
        assert_abs_diff_eq!(outcome.stat().unwrap().percentage, 6.25);
    }

    #[test]
    fn test_zero_channel_rows_are_empty() {
        let mut table = MemoryTable::new("nochan.ms");
        table.push_row(VisRow::new(0, 1, 1, Array2::from_elem((0, 4), false)));
        assert!(matches!(
            global_stat(&table),
            Err(StatsError::EmptyDataset { .. })
        ));
    }
}
