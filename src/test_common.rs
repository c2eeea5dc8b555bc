//! Synthetic datasets shared by unit tests, integration tests and benchmarks.

use crate::{
    engine::{MemoryTable, VisRow},
    ndarray::Array2,
};

/// Field names used by the synthetic datasets.
pub const FIELD_NAMES: [&str; 2] = ["3C286", "J0408-6545"];

/// A flag cube of `shape` with the first `num_flagged` cells flagged, in
/// channel-major order.
pub fn flag_cube(shape: (usize, usize), num_flagged: usize) -> Array2<bool> {
    Array2::from_shape_fn(shape, |(chan, corr)| chan * shape.1 + corr < num_flagged)
}

/// Add ANTENNA, FIELD, SPECTRAL_WINDOW, POLARIZATION and DATA_DESCRIPTION
/// subtables with a single spectral window of `num_chans` channels.
pub fn with_metadata(
    table: MemoryTable,
    num_ants: usize,
    num_chans: usize,
    corr_types: Vec<i32>,
) -> MemoryTable {
    let antenna_names = (0..num_ants)
        .map(|ant| format!("Tile{ant:03}"))
        .collect::<Vec<_>>();
    let channel_freq = (0..num_chans)
        .map(|chan| 150e6 + chan as f64 * 40e3)
        .collect();
    table
        .with_antennas(&antenna_names)
        .with_fields(&FIELD_NAMES)
        .with_spectral_window("SPW0", channel_freq, vec![40e3; num_chans])
        .with_polarization(corr_types)
        .with_data_description(0, 0)
}

/// [`with_metadata`] with 4 antennas and `XX`, `YY` correlations.
pub fn with_standard_metadata(table: MemoryTable, num_chans: usize) -> MemoryTable {
    with_metadata(table, 4, num_chans, vec![9, 12])
}

/// Baseline (0, 1) is 10 flagged and 90 clear, baseline (0, 2) is 5 flagged
/// and 45 clear, and there are three fully flagged autocorrelations.
pub fn get_baseline_scenario_table() -> MemoryTable {
    let shape = (5, 2);
    let mut table = with_standard_metadata(MemoryTable::new("baselines.ms"), shape.0);
    for row_idx in 0..10 {
        let num_flagged = if row_idx == 0 { 10 } else { 0 };
        table.push_row(VisRow::new(0, 1, 1, flag_cube(shape, num_flagged)));
    }
    for row_idx in 0..5 {
        let num_flagged = if row_idx == 2 { 5 } else { 0 };
        table.push_row(VisRow::new(0, 2, 2, flag_cube(shape, num_flagged)).with_field_id(1));
    }
    for ant in 0..3 {
        table.push_row(VisRow::new(ant, ant, 1, flag_cube(shape, 10)));
    }
    table
}

/// Scan 1 is 3 flagged and 7 clear, scan 2 is 1 flagged and 9 clear, plus a
/// fully flagged autocorrelation in scan 1.
pub fn get_scan_scenario_table() -> MemoryTable {
    let shape = (5, 2);
    let mut table = with_standard_metadata(MemoryTable::new("scans.ms"), shape.0);
    table.push_row(VisRow::new(0, 1, 1, flag_cube(shape, 3)));
    table.push_row(VisRow::new(1, 2, 2, flag_cube(shape, 1)).with_field_id(1));
    table.push_row(VisRow::new(3, 3, 1, flag_cube(shape, 10)));
    table
}

/// 100 rows of 4 channels and 2 correlations, with 50 flags in total.
pub fn get_global_scenario_table() -> MemoryTable {
    let shape = (4, 2);
    let mut table = with_standard_metadata(MemoryTable::new("global.ms"), shape.0);
    let baselines = [(0, 0), (0, 1), (0, 2), (1, 2), (2, 3)];
    for row_idx in 0..100 {
        let (ant1, ant2) = baselines[row_idx % baselines.len()];
        let num_flagged = if row_idx % 2 == 0 { 1 } else { 0 };
        table.push_row(VisRow::new(ant1, ant2, 1, flag_cube(shape, num_flagged)));
    }
    table
}

/// Two spectral windows whose correlations are ordered `XX, YY` and `YY, XX`.
pub fn get_two_window_table() -> MemoryTable {
    let shape = (3, 2);
    let mut table = MemoryTable::new("two_windows.ms")
        .with_antennas(&["Tile000", "Tile001", "Tile002"])
        .with_fields(&FIELD_NAMES)
        .with_spectral_window("LOW", vec![100e6, 101e6, 102e6], vec![1e6; 3])
        .with_spectral_window("HIGH", vec![200e6, 201e6, 202e6], vec![1e6; 3])
        .with_polarization(vec![9, 12])
        .with_polarization(vec![12, 9])
        .with_data_description(0, 0)
        .with_data_description(1, 1);
    table.push_row(VisRow::new(0, 1, 1, flag_cube(shape, 2)));
    table.push_row(VisRow::new(1, 2, 1, flag_cube(shape, 1)));
    table.push_row(VisRow::new(0, 2, 1, flag_cube(shape, 3)).with_data_desc_id(1));
    table
}

/// Every baseline, autocorrelations included, for every scan, with a
/// deterministic flag pattern.
pub fn get_synthetic_table(
    num_ants: usize,
    num_scans: usize,
    num_chans: usize,
    num_corrs: usize,
) -> MemoryTable {
    let corr_types = (9..).take(num_corrs).collect();
    let mut table = with_metadata(
        MemoryTable::new("synthetic.ms"),
        num_ants,
        num_chans,
        corr_types,
    );
    for scan in 0..num_scans {
        for ant1 in 0..num_ants {
            for ant2 in ant1..num_ants {
                let flag = Array2::from_shape_fn((num_chans, num_corrs), |(chan, corr)| {
                    (ant1 * 7 + ant2 * 3 + scan + chan + corr) % 5 == 0
                });
                table.push_row(
                    VisRow::new(ant1 as i32, ant2 as i32, scan as i32 + 1, flag)
                        .with_field_id((scan % FIELD_NAMES.len()) as i32),
                );
            }
        }
    }
    table
}
