//! Per-channel, per-correlation flag statistics.
//!
//! The engine sums flag cubes over rows, grouped by data description, leaving
//! a (channel, correlation) count array per group. Each group is mapped to its
//! spectral window and unflattened into a channel-indexed table with a set of
//! `flagged_<pol>`, `clear_<pol>`, `total_<pol>` and `percentage_<pol>`
//! columns per correlation.

use std::collections::BTreeSet;

use log::debug;

use crate::{
    counter::GroupedCounter,
    engine::{EngineError, GroupCounts, GroupRecord, VisTable},
    error::StatsError,
    metadata::DatasetMetadata,
    ndarray::{Array2, Axis},
    stats::{ChannelCorrelationStat, FlagCounts},
};

/// The values of one column of a [`ChannelTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    /// frequencies and widths
    Float(Vec<f64>),
    /// flag counts
    Count(Vec<u64>),
    /// percentages, `None` where the total is zero
    Percentage(Vec<Option<f64>>),
}

impl ColumnValues {
    /// The number of values.
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Count(v) => v.len(),
            ColumnValues::Percentage(v) => v.len(),
        }
    }

    /// Whether there are no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The values as counts, if this is a count column.
    pub fn as_counts(&self) -> Option<&[u64]> {
        match self {
            ColumnValues::Count(v) => Some(v),
            _ => None,
        }
    }
}

/// A named column of a [`ChannelTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelColumn {
    /// column name, e.g. `flagged_XX`
    pub name: String,
    /// one value per channel
    pub values: ColumnValues,
}

/// Flag counts of one spectral window, one row per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTable {
    /// spectral window id
    pub spectral_window_id: i64,
    /// spectral window name
    pub spectral_window_name: String,
    /// channel centre frequencies [Hz]
    pub channel_freq: Vec<f64>,
    /// channel widths [Hz]
    pub channel_width: Vec<f64>,
    /// correlation labels, in correlation axis order
    pub correlation_labels: Vec<String>,
    /// flagged counts, shape (channels, correlations)
    pub flagged: Array2<u64>,
    /// unflagged counts, shape (channels, correlations)
    pub clear: Array2<u64>,
}

impl ChannelTable {
    fn empty(spectral_window_id: i64, spectral_window_name: String) -> Self {
        Self {
            spectral_window_id,
            spectral_window_name,
            channel_freq: vec![],
            channel_width: vec![],
            correlation_labels: vec![],
            flagged: Array2::zeros((0, 0)),
            clear: Array2::zeros((0, 0)),
        }
    }

    /// The number of channels (rows).
    pub fn num_channels(&self) -> usize {
        self.flagged.len_of(Axis(0))
    }

    /// The number of correlations.
    pub fn num_correlations(&self) -> usize {
        self.flagged.len_of(Axis(1))
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    /// The column names, in column order.
    pub fn column_names(&self) -> Vec<String> {
        if self.is_empty() {
            return vec![];
        }
        let mut names = vec!["channel_freq".to_string(), "channel_width".to_string()];
        for label in &self.correlation_labels {
            for prefix in ["flagged", "clear", "total", "percentage"] {
                names.push(format!("{prefix}_{label}"));
            }
        }
        names
    }

    /// All columns, in column order: channel frequency, channel width, then
    /// flagged, clear, total and percentage for each correlation.
    pub fn columns(&self) -> Vec<ChannelColumn> {
        if self.is_empty() {
            return vec![];
        }
        let mut columns = vec![
            ChannelColumn {
                name: "channel_freq".to_string(),
                values: ColumnValues::Float(self.channel_freq.clone()),
            },
            ChannelColumn {
                name: "channel_width".to_string(),
                values: ColumnValues::Float(self.channel_width.clone()),
            },
        ];
        for (corr_idx, label) in self.correlation_labels.iter().enumerate() {
            let counts = self.correlation_counts(corr_idx);
            columns.extend([
                ChannelColumn {
                    name: format!("flagged_{label}"),
                    values: ColumnValues::Count(counts.iter().map(|c| c.flagged).collect()),
                },
                ChannelColumn {
                    name: format!("clear_{label}"),
                    values: ColumnValues::Count(counts.iter().map(|c| c.clear).collect()),
                },
                ChannelColumn {
                    name: format!("total_{label}"),
                    values: ColumnValues::Count(counts.iter().map(FlagCounts::total).collect()),
                },
                ChannelColumn {
                    name: format!("percentage_{label}"),
                    values: ColumnValues::Percentage(
                        counts.iter().map(FlagCounts::percentage).collect(),
                    ),
                },
            ]);
        }
        columns
    }

    /// The counts of every channel for one correlation.
    pub fn correlation_counts(&self, corr_idx: usize) -> Vec<FlagCounts> {
        self.flagged
            .index_axis(Axis(1), corr_idx)
            .iter()
            .zip(self.clear.index_axis(Axis(1), corr_idx).iter())
            .map(|(&flagged, &clear)| FlagCounts::new(flagged, clear))
            .collect()
    }

    /// One [`ChannelCorrelationStat`] per channel per correlation, channel major.
    pub fn stats(&self) -> Vec<ChannelCorrelationStat> {
        let mut stats = Vec::with_capacity(self.flagged.len());
        for ((channel_index, corr_idx), &flagged) in self.flagged.indexed_iter() {
            stats.push(ChannelCorrelationStat {
                spectral_window_id: self.spectral_window_id,
                spectral_window_name: self.spectral_window_name.clone(),
                channel_index,
                channel_freq: self.channel_freq[channel_index],
                channel_width: self.channel_width[channel_index],
                correlation_label: self.correlation_labels[corr_idx].clone(),
                counts: FlagCounts::new(flagged, self.clear[(channel_index, corr_idx)]),
            });
        }
        stats
    }
}

fn data_desc_id(record: &GroupRecord) -> Result<i64, StatsError> {
    record.keys.first().copied().ok_or_else(|| {
        EngineError::InvalidRequest("grouped record has no DATA_DESC_ID key".into()).into()
    })
}

/// Unflatten per-cell records keyed by `[DATA_DESC_ID]` into one
/// [`ChannelTable`] per spectral window, ascending by spectral window id.
///
/// # Errors
///
/// - [`StatsError::DuplicateSpectralWindow`] if two records map to the same
///   spectral window
/// - [`StatsError::ChannelCountMismatch`] or
///   [`StatsError::CorrelationCountMismatch`] if the count arrays disagree
///   with the metadata
/// - [`StatsError::Engine`] if a record has no key or no per-cell counts
/// - lookup errors from [`DatasetMetadata`]
pub fn unflatten(
    records: &[GroupRecord],
    metadata: &DatasetMetadata,
) -> Result<Vec<ChannelTable>, StatsError> {
    let data_desc_ids = records
        .iter()
        .map(data_desc_id)
        .collect::<Result<Vec<_>, _>>()?;
    let spw_ids = data_desc_ids
        .iter()
        .map(|&id| metadata.spectral_window_id(id))
        .collect::<Result<Vec<_>, _>>()?;
    let distinct = spw_ids.iter().collect::<BTreeSet<_>>();
    if distinct.len() != spw_ids.len() {
        let mut seen = BTreeSet::new();
        let spectral_window_id = spw_ids
            .iter()
            .copied()
            .find(|id| !seen.insert(*id))
            .unwrap_or_default();
        return Err(StatsError::DuplicateSpectralWindow {
            spectral_window_id,
            num_records: spw_ids.len(),
            num_distinct: distinct.len(),
        });
    }

    let mut tables = Vec::with_capacity(records.len());
    for ((record, data_desc_id), spectral_window_id) in
        records.iter().zip(data_desc_ids).zip(spw_ids)
    {
        let spw = metadata.spectral_window(spectral_window_id)?;
        let (flagged, clear) = match &record.counts {
            GroupCounts::PerCell {
                count_true,
                count_false,
            } => (count_true.clone(), count_false.clone()),
            GroupCounts::Total { .. } => {
                return Err(EngineError::InvalidRequest(format!(
                    "spectral window {spectral_window_id} has total counts, per-cell counts are needed"
                ))
                .into())
            }
        };
        let (num_channels, num_correlations) = flagged.dim();
        if num_channels == 0 || num_correlations == 0 {
            tables.push(ChannelTable::empty(spectral_window_id, spw.name.clone()));
            continue;
        }

        if spw.channel_freq.len() != num_channels || spw.channel_width.len() != num_channels {
            return Err(StatsError::ChannelCountMismatch {
                spectral_window_id,
                expected: spw.channel_freq.len(),
                found: num_channels,
            });
        }
        let labels = metadata.correlation_labels(data_desc_id)?;
        if labels.len() != num_correlations {
            return Err(StatsError::CorrelationCountMismatch {
                spectral_window_id,
                expected: labels.len(),
                found: num_correlations,
            });
        }

        tables.push(ChannelTable {
            spectral_window_id,
            spectral_window_name: spw.name.clone(),
            channel_freq: spw.channel_freq.clone(),
            channel_width: spw.channel_width.clone(),
            correlation_labels: labels.to_vec(),
            flagged,
            clear,
        });
    }
    tables.sort_by_key(|t| t.spectral_window_id);
    debug!(
        "unflattened {} records into {} spectral windows",
        records.len(),
        tables.len()
    );
    Ok(tables)
}

/// Per-channel flag tables of the cross-correlations in `table`.
///
/// # Errors
///
/// See [`unflatten`]; also [`StatsError::Engine`] if the grouped count fails.
pub fn per_channel_tables<T: VisTable + ?Sized>(
    table: &T,
    metadata: &DatasetMetadata,
) -> Result<Vec<ChannelTable>, StatsError> {
    let records = GroupedCounter::new(table).per_data_description()?;
    unflatten(&records, metadata)
}
