//! Per-scan flag statistics.

use std::collections::BTreeMap;

use log::warn;

use crate::{
    counter::GroupedCounter,
    engine::{GroupRecord, VisTable},
    error::StatsError,
    metadata::DatasetMetadata,
    stats::{FlagCounts, ScanStat},
};

/// Turn records keyed by `[SCAN_NUMBER, FIELD_ID]` into one [`ScanStat`] per
/// scan, ascending by scan number.
///
/// A scan which spans several fields is summed into a single row labelled with
/// its lowest field id.
///
/// # Errors
///
/// [`StatsError::UnresolvedField`] if a field id has no name.
pub fn scan_stats_from_records(
    records: &[GroupRecord],
    metadata: &DatasetMetadata,
) -> Result<Vec<ScanStat>, StatsError> {
    // scan -> (lowest field, counts, number of fields)
    let mut scans: BTreeMap<i64, (i64, FlagCounts, usize)> = BTreeMap::new();
    for record in records {
        let (scan_number, field_id) = match record.keys[..] {
            [scan_number, field_id, ..] => (scan_number, field_id),
            [scan_number] => (scan_number, 0),
            [] => continue,
        };
        let (flagged, clear) = record.counts.totals();
        let entry = scans
            .entry(scan_number)
            .or_insert((field_id, FlagCounts::default(), 0));
        entry.0 = entry.0.min(field_id);
        entry.1 += FlagCounts::new(flagged, clear);
        entry.2 += 1;
    }

    scans
        .into_iter()
        .map(|(scan_number, (field_id, counts, num_fields))| {
            if num_fields > 1 {
                warn!(
                    "scan {} spans {} fields, labelling it with field {}",
                    scan_number, num_fields, field_id
                );
            }
            Ok(ScanStat {
                scan_number,
                field_id,
                field_name: metadata.field_name(field_id)?.to_string(),
                counts,
            })
        })
        .collect()
}

/// The sum of every scan's counts.
pub fn scan_total(scans: &[ScanStat]) -> FlagCounts {
    scans.iter().map(|s| s.counts).sum()
}

/// Per-scan flag statistics of the cross-correlations in `table`.
///
/// # Errors
///
/// - [`StatsError::Engine`] if the grouped count fails
/// - [`StatsError::UnresolvedField`] if a field id has no name
pub fn per_scan_stats<T: VisTable + ?Sized>(
    table: &T,
    metadata: &DatasetMetadata,
) -> Result<Vec<ScanStat>, StatsError> {
    let records = GroupedCounter::new(table).per_scan()?;
    scan_stats_from_records(&records, metadata)
}
