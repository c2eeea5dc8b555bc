//! A single flagged-vs-frequency series spanning every spectral window.
//!
//! The series is taken from each window's channel table by fixed column
//! position: [`HISTOGRAM_FLAGGED_COLUMN_IDX`] for the flagged counts and
//! [`HISTOGRAM_TOTAL_COLUMN_IDX`] for the totals. When windows order their
//! correlations differently those positions hold differently named columns.
//! This is reported as a [`SeriesNameMismatch`] and the first window's names
//! are kept for the combined series.

use std::fmt::Display;

use itertools::izip;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::{
    channel::ChannelTable,
    constants::{HISTOGRAM_FLAGGED_COLUMN_IDX, HISTOGRAM_TOTAL_COLUMN_IDX},
    stats::FlagCounts,
};

lazy_static! {
    static ref SERIES_NAME_RE: Regex = Regex::new(r"^(?:flagged|clear|total)_(.+)$").unwrap();
}

/// A spectral window whose series column name differs from the first window's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesNameMismatch {
    /// the spectral window with the unexpected name
    pub spectral_window_id: i64,
    /// the column position which was compared
    pub position: usize,
    /// the name in the first window
    pub expected: String,
    /// the name in this window
    pub found: String,
}

impl Display for SeriesNameMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "spectral window {} has column {} named {}, expected {}",
            self.spectral_window_id, self.position, self.found, self.expected
        )
    }
}

/// One channel of the combined series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramPoint {
    /// the window this channel belongs to
    pub spectral_window_id: i64,
    /// channel centre frequency [Hz]
    pub channel_freq: f64,
    /// flag counts of the selected series
    pub counts: FlagCounts,
}

/// The flagged fraction against frequency across all spectral windows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistogramSeries {
    /// nominal name of the flagged column, from the first window
    pub flagged_name: String,
    /// nominal name of the total column, from the first window
    pub total_name: String,
    /// every channel of every non-empty window, in window then channel order
    pub points: Vec<HistogramPoint>,
    /// windows whose column names differ from the nominal ones
    pub mismatches: Vec<SeriesNameMismatch>,
}

impl HistogramSeries {
    /// The correlation label of the nominal series, e.g. `XX`.
    pub fn label(&self) -> Option<&str> {
        SERIES_NAME_RE
            .captures(&self.flagged_name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Combine the fixed-position series of every channel table.
///
/// Empty tables are skipped. Mismatched names are recorded and logged, never
/// fatal.
pub fn assemble_histogram(tables: &[ChannelTable]) -> HistogramSeries {
    let mut series = HistogramSeries::default();
    let mut nominal: Option<(String, String)> = None;

    for table in tables.iter().filter(|t| !t.is_empty()) {
        let columns = table.columns();
        let (flagged_col, total_col) = match (
            columns.get(HISTOGRAM_FLAGGED_COLUMN_IDX),
            columns.get(HISTOGRAM_TOTAL_COLUMN_IDX),
        ) {
            (Some(flagged), Some(total)) => (flagged, total),
            _ => continue,
        };

        match &nominal {
            None => {
                nominal = Some((flagged_col.name.clone(), total_col.name.clone()));
            }
            Some((flagged_name, total_name)) => {
                for (position, expected, found) in [
                    (HISTOGRAM_FLAGGED_COLUMN_IDX, flagged_name, &flagged_col.name),
                    (HISTOGRAM_TOTAL_COLUMN_IDX, total_name, &total_col.name),
                ] {
                    if expected != found {
                        let mismatch = SeriesNameMismatch {
                            spectral_window_id: table.spectral_window_id,
                            position,
                            expected: expected.clone(),
                            found: found.clone(),
                        };
                        warn!("histogram series name mismatch: {}", mismatch);
                        series.mismatches.push(mismatch);
                    }
                }
            }
        }

        let flagged = flagged_col.values.as_counts().unwrap_or_default();
        let totals = total_col.values.as_counts().unwrap_or_default();
        series.points.extend(
            izip!(&table.channel_freq, flagged, totals).map(
                |(&channel_freq, &flagged, &total)| HistogramPoint {
                    spectral_window_id: table.spectral_window_id,
                    channel_freq,
                    counts: FlagCounts::new(flagged, total.saturating_sub(flagged)),
                },
            ),
        );
    }

    if let Some((flagged_name, total_name)) = nominal {
        series.flagged_name = flagged_name;
        series.total_name = total_name;
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::per_channel_tables, metadata::DatasetMetadata,
        test_common::get_two_window_table,
    };

    #[test]
    fn test_mismatched_windows_still_combine() {
        let table = get_two_window_table();
        let metadata = DatasetMetadata::from_table(&table).unwrap();
        let tables = per_channel_tables(&table, &metadata).unwrap();
        let series = assemble_histogram(&tables);

        assert_eq!(series.flagged_name, "flagged_XX");
        assert_eq!(series.total_name, "total_XX");
        assert_eq!(series.label(), Some("XX"));
        assert_eq!(
            series.mismatches[0],
            SeriesNameMismatch {
                spectral_window_id: 1,
                position: HISTOGRAM_FLAGGED_COLUMN_IDX,
                expected: "flagged_XX".into(),
                found: "flagged_YY".into(),
            }
        );
        assert_eq!(series.mismatches.len(), 2);
        let num_channels: usize = tables.iter().map(ChannelTable::num_channels).sum();
        assert_eq!(series.points.len(), num_channels);
        assert!(series.points[..tables[0].num_channels()]
            .iter()
            .all(|p| p.spectral_window_id == 0));
    }

    #[test]
    fn test_consistent_windows_have_no_mismatch() {
        let table = get_two_window_table();
        let metadata = DatasetMetadata::from_table(&table).unwrap();
        let tables = per_channel_tables(&table, &metadata).unwrap();
        let series = assemble_histogram(&tables[..1]);
        assert!(series.mismatches.is_empty());
        for point in &series.points {
            assert!(point.counts.total() > 0);
        }
    }

    #[test]
    fn test_no_tables_is_empty_series() {
        let series = assemble_histogram(&[]);
        assert!(series.points.is_empty());
        assert!(series.mismatches.is_empty());
        assert_eq!(series.label(), None);
    }
}
