use approx::assert_abs_diff_eq;
use msflagstats::{
    assemble_report,
    engine::MemoryTable,
    test_common::{get_baseline_scenario_table, get_synthetic_table, get_two_window_table},
    FlagCounts, ReportContext, ReportContextBuilder,
};
use std::fs;
use tempfile::tempdir;

/// Flag counts of every cross-correlation row, counted directly.
fn cross_counts(table: &MemoryTable) -> FlagCounts {
    table
        .rows()
        .iter()
        .filter(|row| row.antenna1 != row.antenna2)
        .map(|row| {
            let flagged = row.flag.iter().filter(|&&f| f).count() as u64;
            FlagCounts::new(flagged, row.flag.len() as u64 - flagged)
        })
        .sum()
}

#[test]
fn test_reports_are_idempotent() {
    let table = get_synthetic_table(6, 3, 8, 4);
    let first = assemble_report(&table, &ReportContext::default()).unwrap();
    let second = assemble_report(&table, &ReportContext::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_parallel_stages_match_sequential() {
    let table = get_synthetic_table(5, 2, 4, 2);
    let sequential = assemble_report(&table, &ReportContext::default()).unwrap();
    let ctx = ReportContextBuilder::default()
        .parallel_stages(true)
        .build()
        .unwrap();
    assert_eq!(assemble_report(&table, &ctx).unwrap(), sequential);
}

#[test]
fn test_antenna_fold_counts_each_baseline_twice() {
    let table = get_synthetic_table(7, 2, 4, 2);
    let stats = assemble_report(&table, &ReportContext::default())
        .unwrap()
        .flag_stats
        .unwrap();
    let antenna_sum: FlagCounts = stats.antennas.unwrap().iter().map(|a| a.counts).sum();
    let cross = cross_counts(&table);
    assert_eq!(antenna_sum, cross + cross);
}

#[test]
fn test_grouped_totals_agree() {
    let table = get_synthetic_table(4, 3, 5, 2);
    let stats = assemble_report(&table, &ReportContext::default())
        .unwrap()
        .flag_stats
        .unwrap();
    let cross = cross_counts(&table);

    let scan_sum: FlagCounts = stats.scans.as_ref().unwrap().iter().map(|s| s.counts).sum();
    assert_eq!(scan_sum, cross);
    assert_eq!(stats.scan_total.unwrap(), cross);

    let channel_sum: FlagCounts = stats
        .channels
        .as_ref()
        .unwrap()
        .iter()
        .flat_map(|table| table.stats())
        .map(|stat| stat.counts)
        .sum();
    assert_eq!(channel_sum, cross);
}

#[test]
fn test_percentages_are_in_range() {
    let table = get_synthetic_table(4, 2, 3, 4);
    let stats = assemble_report(&table, &ReportContext::default())
        .unwrap()
        .flag_stats
        .unwrap();
    let mut all_counts = vec![];
    all_counts.extend(stats.antennas.unwrap().iter().map(|a| a.counts));
    all_counts.extend(stats.scans.unwrap().iter().map(|s| s.counts));
    for channel_table in stats.channels.unwrap() {
        all_counts.extend(channel_table.stats().iter().map(|s| s.counts));
    }
    for counts in all_counts {
        let percentage = counts.percentage().unwrap();
        assert!((0.0..=100.0).contains(&percentage));
    }
    let global = stats.global.unwrap().into_result().unwrap();
    assert!(global.flagged_points <= global.total_points);
    assert!((0.0..=100.0).contains(&global.percentage));
}

#[test]
fn test_global_differs_from_grouped() {
    let table = get_baseline_scenario_table();
    let stats = assemble_report(&table, &ReportContext::default())
        .unwrap()
        .flag_stats
        .unwrap();
    assert_abs_diff_eq!(stats.global.unwrap().stat().unwrap().percentage, 25.0);
    assert_abs_diff_eq!(stats.scan_total.unwrap().percentage().unwrap(), 10.0);
}

#[test]
fn test_two_windows_share_a_histogram() {
    let table = get_two_window_table();
    let stats = assemble_report(&table, &ReportContext::default())
        .unwrap()
        .flag_stats
        .unwrap();
    let channels = stats.channels.unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0].spectral_window_name, "LOW");
    assert_eq!(channels[1].spectral_window_name, "HIGH");
    let histogram = stats.histogram.unwrap();
    assert_eq!(histogram.points.len(), 6);
    assert_eq!(histogram.mismatches.len(), 2);
}

#[test]
fn test_cli_help() {
    assert_cli::Assert::cargo_binary("msflagstats")
        .with_args(&["--help"])
        .succeeds()
        .and()
        .stdout()
        .contains("--base-dir")
        .unwrap();
}

#[test]
fn test_cli_version() {
    assert_cli::Assert::cargo_binary("msflagstats")
        .with_args(&["--version"])
        .succeeds()
        .and()
        .stdout()
        .contains(env!("CARGO_PKG_VERSION"))
        .unwrap();
}

#[test]
fn test_cli_dry_run() {
    let tmp_dir = tempdir().unwrap();
    fs::create_dir(tmp_dir.path().join("1088285600.ms")).unwrap();
    assert_cli::Assert::cargo_binary("msflagstats")
        .with_args(&[
            "--base-dir",
            tmp_dir.path().to_str().unwrap(),
            "--dry-run",
        ])
        .succeeds()
        .unwrap();
}

#[test]
fn test_cli_missing_dataset_fails() {
    let tmp_dir = tempdir().unwrap();
    let missing = tmp_dir.path().join("missing.ms");
    assert_cli::Assert::cargo_binary("msflagstats")
        .with_args(&["--no-draw-progress", missing.to_str().unwrap()])
        .fails()
        .unwrap();
}
