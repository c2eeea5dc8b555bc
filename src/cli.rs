//! Command Line Interface helpers for msflagstats

use crate::{
    batch::{BatchConfig, BatchSummary, Selection, SortOrder},
    engine::MsTable,
    error::{FlagStatsError, FlagStatsError::DryRun},
    global::GlobalOutcome,
    report::{DatasetFlagReport, ReportContext},
    stats::FlagCounts,
};
use clap::{arg, command, ArgGroup, ErrorKind::ArgumentNotFound, ValueHint::DirPath};
use log::{debug, info, trace};
use prettytable::{cell, format as prettyformat, row, table};
use std::{
    ffi::OsString,
    fmt::{Debug, Display},
    path::{Path, PathBuf},
};

/// Everything needed to run msflagstats over a set of measurement sets.
#[derive(Debug)]
pub struct FlagStatsContext {
    /// the datasets to process, in processing order
    pub datasets: Vec<PathBuf>,
    /// how the datasets were found and how they are processed
    pub batch_cfg: BatchConfig,
    /// which statistics to compute
    pub report_ctx: ReportContext,
}

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

/// Write many info-level log lines of how this executable was compiled.
///
/// # Errors
///
/// propagates writeln! fails
pub fn fmt_build_info(f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match GIT_HEAD_REF {
        Some(hr) => {
            let dirty = GIT_DIRTY.unwrap_or(false);
            writeln!(
                f,
                "Compiled on git commit hash: {}{}",
                GIT_COMMIT_HASH.unwrap_or("<unknown>"),
                if dirty { " (dirty)" } else { "" }
            )?;
            writeln!(f, "            git head ref: {hr}")?;
        }
        None => writeln!(f, "Compiled on git commit hash: <no git info>")?,
    }
    writeln!(f, "            {BUILT_TIME_UTC}")?;
    writeln!(f, "         with compiler {RUSTC_VERSION}")?;
    writeln!(f)?;
    Ok(())
}

impl Display for FlagStatsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} version {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )?;

        fmt_build_info(f)?;

        let mut dataset_table = table!(["", "dataset"]);
        dataset_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
        for (idx, path) in self.datasets.iter().enumerate() {
            dataset_table.add_row(row![r => format!("{}:", idx + 1), path.display()]);
        }
        writeln!(
            f,
            "Dataset details (select={}):\n{}",
            self.datasets.len(),
            dataset_table
        )?;

        write!(f, "{}", self.report_ctx)?;
        write!(f, "{}", self.batch_cfg)?;

        Ok(())
    }
}

impl FlagStatsContext {
    fn get_matches<I, T>(args: I) -> Result<clap::ArgMatches, FlagStatsError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        let mut app = command!()
            .arg_required_else_help(true)
            .next_line_help(false)
            .about("Report how much of each radio interferometer measurement set is flagged, \
                    by antenna, by scan and by channel.")
            .args(&[
                // input options
                arg!(datasets: [PATHS]... "Measurement sets to process")
                    .help_heading("INPUT")
                    .value_hint(DirPath),
                arg!(-b --"base-dir" <DIR> "Process every *.ms directory in <DIR>")
                    .help_heading("INPUT")
                    .value_hint(DirPath)
                    .required(false),
                arg!(--sort <ORDER> "Order of datasets found in --base-dir: name, mtime or unsorted [default: mtime]")
                    .help_heading("INPUT")
                    .requires("base-dir")
                    .required(false),
                arg!(--select <NUMBERS>... "1-based numbers of the datasets in --base-dir to process")
                    .help_heading("INPUT")
                    .requires("base-dir")
                    .multiple_values(true)
                    .required(false),

                // statistics options
                arg!(--"no-antenna" "Do not compute per-antenna statistics")
                    .help_heading("STATISTICS"),
                arg!(--"no-scan" "Do not compute per-scan statistics")
                    .help_heading("STATISTICS"),
                arg!(--"no-channel" "Do not compute per-channel statistics or the histogram")
                    .help_heading("STATISTICS"),
                arg!(--"no-global" "Do not compute the global flag fraction")
                    .help_heading("STATISTICS"),

                // processing options
                arg!(--"parallel-stages" "Run the statistics of a dataset in parallel"),
                arg!(--"parallel-datasets" "Process datasets in parallel"),
                arg!(--"dry-run" "Just list the datasets and exit"),
                arg!(--"no-draw-progress" "do not show progress bars"),
            ])
            .group(
                ArgGroup::new("input")
                    .args(&["datasets", "base-dir"])
                    .required(true),
            );
        let matches = app.try_get_matches_from_mut(args)?;
        Ok(matches)
    }

    fn parse_report_matches(matches: &clap::ArgMatches) -> ReportContext {
        ReportContext {
            per_antenna: !matches.is_present("no-antenna"),
            per_scan: !matches.is_present("no-scan"),
            per_channel: !matches.is_present("no-channel"),
            global: !matches.is_present("no-global"),
            parallel_stages: matches.is_present("parallel-stages"),
            ..ReportContext::default()
        }
    }

    fn parse_batch_matches(matches: &clap::ArgMatches) -> Result<BatchConfig, FlagStatsError> {
        let sort_order = match matches.value_of("sort") {
            Some(order) => order.parse::<SortOrder>()?,
            None => SortOrder::default(),
        };
        let selection = match matches.values_of_t::<usize>("select") {
            Ok(numbers) => Selection::Numbers(numbers),
            Err(err) => match err.kind() {
                ArgumentNotFound { .. } => Selection::All,
                _ => return Err(err.into()),
            },
        };
        let datasets = match matches.values_of_t::<PathBuf>("datasets") {
            Ok(datasets) => datasets,
            Err(err) => match err.kind() {
                ArgumentNotFound { .. } => vec![],
                _ => return Err(err.into()),
            },
        };
        Ok(BatchConfig {
            base_dir: matches.value_of("base-dir").map(PathBuf::from),
            datasets,
            sort_order,
            process: !matches.is_present("dry-run"),
            selection,
            parallel_datasets: matches.is_present("parallel-datasets"),
            draw_progress: !matches.is_present("no-draw-progress"),
        })
    }

    /// Parse an iterator of arguments, `args` into a `FlagStatsContext`.
    ///
    /// # Errors
    ///
    /// Can raise:
    /// - `clap::Error` if clap cannot parse `args`
    /// - `FlagStatsError::CLIError` if the arguments are invalid.
    /// - discovery errors if `--base-dir` has no matching datasets
    /// - `FlagStatsError::DryRun` once the datasets are listed, if `--dry-run`
    pub fn from_args<I, T>(args: I) -> Result<Self, FlagStatsError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        debug!("args:\n{:?}", &args);

        let matches = Self::get_matches(args)?;
        trace!("arg matches:\n{:?}", &matches);

        let report_ctx = Self::parse_report_matches(&matches);
        let batch_cfg = Self::parse_batch_matches(&matches)?;
        let datasets = batch_cfg.resolve_datasets()?;

        let result = Self {
            datasets,
            batch_cfg,
            report_ctx,
        };

        info!("{}", &result);

        if !result.batch_cfg.process {
            return Err(DryRun {});
        }

        Ok(result)
    }

    /// Report on every dataset, printing each report once the batch is done.
    ///
    /// # Errors
    ///
    /// - `FlagStatsError::BatchFailed` if any dataset failed. The others are
    ///   still processed and printed.
    /// - `FlagStatsError::DryRun` if the batch only lists datasets
    pub fn run(self) -> Result<BatchSummary, FlagStatsError> {
        let summary = self
            .batch_cfg
            .process_resolved(
                &self.datasets,
                |path: &Path| MsTable::open(path),
                &self.report_ctx,
            )
            .ok_or(DryRun {})?;
        for report in summary.reports() {
            println!("{}", ReportDisplay(report));
        }
        summary.check()?;
        Ok(summary)
    }
}

fn fmt_percentage(percentage: Option<f64>) -> String {
    percentage.map_or_else(|| "-".into(), |p| format!("{p:.3}"))
}

/// Tabular rendering of a [`DatasetFlagReport`].
pub struct ReportDisplay<'a>(pub &'a DatasetFlagReport);

impl Display for ReportDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let report = self.0;
        writeln!(f, "Dataset:              {}", report.dataset)?;
        writeln!(f, "Rows:                 {}", report.row_count)?;
        writeln!(f, "Columns:              {}", report.column_names.join(", "))?;

        let stats = match &report.flag_stats {
            Some(stats) => stats,
            None => return writeln!(f, "No FLAG column, no flag statistics."),
        };

        if let Some(antennas) = &stats.antennas {
            let mut antenna_table = table!(["", "name", "flagged", "total", "%"]);
            antenna_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
            for antenna in antennas {
                antenna_table.add_row(row![r =>
                    format!("ant{}:", antenna.antenna_id),
                    antenna.name,
                    antenna.counts.flagged,
                    antenna.counts.total(),
                    fmt_percentage(antenna.counts.percentage())
                ]);
            }
            writeln!(
                f,
                "Antenna details (all={}):\n{}",
                antennas.len(),
                antenna_table
            )?;
        }

        if let Some(scans) = &stats.scans {
            let mut scan_table = table!(["", "field", "flagged", "total", "%"]);
            scan_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
            for scan in scans {
                scan_table.add_row(row![r =>
                    format!("scan{}:", scan.scan_number),
                    scan.field_name,
                    scan.counts.flagged,
                    scan.counts.total(),
                    fmt_percentage(scan.counts.percentage())
                ]);
            }
            if let Some(total) = stats.scan_total {
                scan_table.add_row(row![r =>
                    "total:",
                    "",
                    total.flagged,
                    total.total(),
                    fmt_percentage(total.percentage())
                ]);
            }
            writeln!(f, "Scan details (all={}):\n{}", scans.len(), scan_table)?;
        }

        if let Some(channels) = &stats.channels {
            for channel_table in channels {
                let mut corr_table = table!(["", "flagged", "total", "%"]);
                corr_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
                for (corr_idx, label) in channel_table.correlation_labels.iter().enumerate() {
                    let counts: FlagCounts =
                        channel_table.correlation_counts(corr_idx).iter().sum();
                    corr_table.add_row(row![r =>
                        format!("{label}:"),
                        counts.flagged,
                        counts.total(),
                        fmt_percentage(counts.percentage())
                    ]);
                }
                let (min_freq, max_freq) = channel_table
                    .channel_freq
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &freq| {
                        (lo.min(freq), hi.max(freq))
                    });
                writeln!(
                    f,
                    "Spectral window {} {} ({} channels, {:.4}-{:.4} MHz):\n{}",
                    channel_table.spectral_window_id,
                    channel_table.spectral_window_name,
                    channel_table.num_channels(),
                    min_freq / 1e6,
                    max_freq / 1e6,
                    corr_table
                )?;
            }
        }

        if let Some(histogram) = &stats.histogram {
            writeln!(
                f,
                "Histogram series {}: {} points, {} name mismatches",
                histogram.label().unwrap_or(&histogram.flagged_name),
                histogram.points.len(),
                histogram.mismatches.len()
            )?;
        }

        match &stats.global {
            Some(GlobalOutcome::Computed(global)) => writeln!(
                f,
                "Global:               {} / {} = {:.3}%",
                global.flagged_points, global.total_points, global.percentage
            )?,
            Some(GlobalOutcome::Empty { .. }) => {
                writeln!(f, "Global:               no flag points")?
            }
            None => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::MemoryTable,
        report::assemble_report,
        test_common::{get_baseline_scenario_table, with_standard_metadata},
    };

    #[test]
    fn test_report_display_doesnt_crash() {
        let table = get_baseline_scenario_table();
        let report = assemble_report(&table, &ReportContext::default()).unwrap();
        let display = format!("{}", ReportDisplay(&report));
        assert!(display.contains("baselines.ms"));
        assert!(display.contains("Tile000"));
        assert!(display.contains("J0408-6545"));
        assert!(display.contains("total:"));
        assert!(display.contains("Spectral window 0 SPW0"));
        assert!(display.contains("Histogram series XX"));
        assert!(display.contains("45 / 180 = 25.000%"));
    }

    #[test]
    fn test_report_display_empty_dataset() {
        let table = with_standard_metadata(MemoryTable::new("zero.ms"), 2);
        let report = assemble_report(&table, &ReportContext::default()).unwrap();
        let display = format!("{}", ReportDisplay(&report));
        assert!(display.contains("Antenna details (all=0)"));
        assert!(display.contains("Global:               no flag points"));
    }

    #[test]
    fn test_report_display_without_flags() {
        let mut table = get_baseline_scenario_table();
        table.drop_column("FLAG");
        let report = assemble_report(&table, &ReportContext::default()).unwrap();
        let display = format!("{}", ReportDisplay(&report));
        assert!(display.contains("No FLAG column"));
    }

    #[test]
    fn test_context_display_doesnt_crash() {
        let ctx = FlagStatsContext::from_args([
            "msflagstats",
            "--no-scan",
            "--parallel-datasets",
            "a.ms",
        ])
        .unwrap();
        let display = format!("{}", &ctx);
        assert!(display.contains("a.ms"));
        assert!(display.contains("Will not compute per-scan statistics."));
        assert!(display.contains("Will process datasets in parallel."));
    }
}

#[cfg(test)]
mod argparse_tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn make_base_dir() -> TempDir {
        let tmp_dir = tempdir().unwrap();
        for name in ["b.ms", "a.ms", "c.ms"] {
            fs::create_dir(tmp_dir.path().join(name)).unwrap();
        }
        tmp_dir
    }

    #[test]
    fn test_parse_missing_input() {
        match FlagStatsContext::from_args(["msflagstats", "--no-global"]) {
            Err(FlagStatsError::ClapError(inner)) => assert!(matches!(
                inner.kind(),
                clap::ErrorKind::MissingRequiredArgument { .. }
            )),
            Err(e) => panic!("expected missing required argument error, not {e}"),
            Ok(_) => panic!("expected error, but got Ok(_)"),
        }
    }

    #[test]
    fn test_parse_paths_and_base_dir_conflict() {
        let tmp_dir = make_base_dir();
        let base_dir = tmp_dir.path().to_str().unwrap();
        assert!(matches!(
            FlagStatsContext::from_args(["msflagstats", "--base-dir", base_dir, "a.ms"]),
            Err(FlagStatsError::ClapError(_))
        ));
    }

    #[test]
    fn test_parse_select_requires_base_dir() {
        assert!(matches!(
            FlagStatsContext::from_args(["msflagstats", "--select", "1", "--", "a.ms"]),
            Err(FlagStatsError::ClapError(_))
        ));
    }

    #[test]
    fn test_parse_paths() {
        let FlagStatsContext {
            datasets,
            batch_cfg,
            report_ctx,
        } = FlagStatsContext::from_args([
            "msflagstats",
            "--no-antenna",
            "--no-channel",
            "--parallel-stages",
            "--no-draw-progress",
            "x.ms",
            "y.ms",
        ])
        .unwrap();
        assert_eq!(datasets, vec![PathBuf::from("x.ms"), PathBuf::from("y.ms")]);
        assert!(batch_cfg.base_dir.is_none());
        assert_eq!(batch_cfg.datasets, datasets);
        assert!(batch_cfg.process);
        assert!(!report_ctx.per_antenna);
        assert!(report_ctx.per_scan);
        assert!(!report_ctx.per_channel);
        assert!(report_ctx.global);
        assert!(report_ctx.parallel_stages);
        assert!(!batch_cfg.parallel_datasets);
        assert!(!batch_cfg.draw_progress);
    }

    #[test]
    fn test_parse_base_dir_sorted_selection() {
        let tmp_dir = make_base_dir();
        let base_dir = tmp_dir.path().to_str().unwrap();
        let ctx = FlagStatsContext::from_args([
            "msflagstats",
            "--base-dir",
            base_dir,
            "--sort",
            "name",
            "--select",
            "3",
            "1",
            "7",
        ])
        .unwrap();
        assert_eq!(
            ctx.datasets,
            vec![tmp_dir.path().join("c.ms"), tmp_dir.path().join("a.ms")]
        );
        let batch_cfg = ctx.batch_cfg;
        assert_eq!(batch_cfg.base_dir, Some(tmp_dir.path().to_path_buf()));
        assert!(batch_cfg.datasets.is_empty());
        assert_eq!(batch_cfg.sort_order, SortOrder::Name);
        assert_eq!(batch_cfg.selection, Selection::Numbers(vec![3, 1, 7]));
    }

    #[test]
    fn test_parse_invalid_sort() {
        let tmp_dir = make_base_dir();
        let base_dir = tmp_dir.path().to_str().unwrap();
        assert!(matches!(
            FlagStatsContext::from_args(["msflagstats", "--base-dir", base_dir, "--sort", "size"]),
            Err(FlagStatsError::CLIError(_))
        ));
    }

    #[test]
    fn test_parse_empty_selection() {
        let tmp_dir = make_base_dir();
        let base_dir = tmp_dir.path().to_str().unwrap();
        assert!(matches!(
            FlagStatsContext::from_args(["msflagstats", "--base-dir", base_dir, "--select", "9"]),
            Err(FlagStatsError::NoDatasetsSelected { .. })
        ));
    }

    #[test]
    fn test_parse_empty_base_dir() {
        let tmp_dir = tempdir().unwrap();
        let base_dir = tmp_dir.path().to_str().unwrap();
        assert!(matches!(
            FlagStatsContext::from_args(["msflagstats", "--base-dir", base_dir]),
            Err(FlagStatsError::NoDatasetsFound(_))
        ));
    }

    #[test]
    fn test_parse_dry_run() {
        let tmp_dir = make_base_dir();
        let base_dir = tmp_dir.path().to_str().unwrap();
        assert!(matches!(
            FlagStatsContext::from_args(["msflagstats", "--base-dir", base_dir, "--dry-run"]),
            Err(DryRun {})
        ));
    }

    #[test]
    fn test_run_continues_past_missing_datasets() {
        let tmp_dir = tempdir().unwrap();
        let missing_a = tmp_dir.path().join("missing_a.ms");
        let missing_b = tmp_dir.path().join("missing_b.ms");
        let ctx = FlagStatsContext::from_args([
            "msflagstats",
            "--no-draw-progress",
            missing_a.to_str().unwrap(),
            missing_b.to_str().unwrap(),
        ])
        .unwrap();
        assert!(matches!(
            ctx.run(),
            Err(FlagStatsError::BatchFailed {
                num_failed: 2,
                num_datasets: 2
            })
        ));
    }
}
