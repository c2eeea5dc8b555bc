//! Folding per-baseline flag counts into per-antenna statistics.
//!
//! Flags are recorded per baseline, but an antenna takes part in many
//! baselines. Each baseline's counts are attributed once to each of its two
//! antennas and then summed by antenna, so the per-antenna totals sum to twice
//! the baseline totals.

use std::collections::BTreeMap;

use log::trace;

use crate::{
    counter::GroupedCounter,
    engine::{GroupRecord, VisTable},
    error::StatsError,
    metadata::DatasetMetadata,
    stats::{AntennaStat, FlagCounts},
};

/// Sum baseline records keyed by `[ANTENNA1, ANTENNA2]` into per-antenna
/// counts, ascending by antenna id.
pub fn fold_baselines(records: &[GroupRecord]) -> BTreeMap<i64, FlagCounts> {
    let mut per_antenna: BTreeMap<i64, FlagCounts> = BTreeMap::new();
    for record in records {
        let (flagged, clear) = record.counts.totals();
        let counts = FlagCounts::new(flagged, clear);
        for &antenna_id in record.keys.iter().take(2) {
            *per_antenna.entry(antenna_id).or_default() += counts;
        }
    }
    per_antenna
}

/// Attach antenna names to folded counts.
///
/// # Errors
///
/// [`StatsError::UnresolvedAntenna`] if an antenna id has no name.
pub fn resolve_antennas(
    folded: BTreeMap<i64, FlagCounts>,
    metadata: &DatasetMetadata,
) -> Result<Vec<AntennaStat>, StatsError> {
    folded
        .into_iter()
        .map(|(antenna_id, counts)| {
            Ok(AntennaStat {
                antenna_id,
                name: metadata.antenna_name(antenna_id)?.to_string(),
                counts,
            })
        })
        .collect()
}

/// Per-antenna flag statistics of the cross-correlations in `table`.
///
/// # Errors
///
/// - [`StatsError::Engine`] if the grouped count fails
/// - [`StatsError::UnresolvedAntenna`] if an antenna id has no name
pub fn per_antenna_stats<T: VisTable + ?Sized>(
    table: &T,
    metadata: &DatasetMetadata,
) -> Result<Vec<AntennaStat>, StatsError> {
    let baselines = GroupedCounter::new(table).per_baseline()?;
    let folded = fold_baselines(&baselines);
    trace!(
        "{}: folded {} baselines into {} antennas",
        table.name(),
        baselines.len(),
        folded.len()
    );
    resolve_antennas(folded, metadata)
}
