use clap::ErrorKind::{DisplayHelp, DisplayVersion};
use log::{info, trace};
use msflagstats::{
    cli::FlagStatsContext,
    get_durations,
    FlagStatsError::{ClapError, DryRun},
};
use std::{env, ffi::OsString, fmt::Debug, time::Duration};

fn main_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    I: Debug,
{
    let flagstats_ctx = match FlagStatsContext::from_args(args) {
        Ok(flagstats_ctx) => flagstats_ctx,
        Err(DryRun {}) => {
            info!("Dry run. No datasets will be processed.");
            return 0;
        }
        Err(ClapError(inner)) => {
            // Swallow broken pipe errors
            trace!("clap error: {:?}", inner.kind());
            let _ = inner.print();
            match inner.kind() {
                DisplayHelp | DisplayVersion => return 0,
                _ => return 1,
            }
        }
        Err(e) => {
            eprintln!("error parsing args: {e}");
            return 1;
        }
    };

    let num_datasets = flagstats_ctx.datasets.len();
    let result = flagstats_ctx.run();

    info!(
        "total duration: {:?}",
        get_durations()
            .into_iter()
            .fold(Duration::ZERO, |duration_sum, (name, duration)| {
                info!("{} duration: {:?}", name, duration);
                duration_sum + duration
            })
    );

    match result {
        Ok(summary) => {
            info!(
                "processed {} of {} datasets",
                summary.reports().count(),
                num_datasets
            );
            0
        }
        Err(e) => {
            eprintln!("flag statistics error: {e}");
            1
        }
    }
}

fn main() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    trace!("start main");
    let retcode = main_with_args(env::args());
    trace!("end main");
    std::process::exit(retcode);
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::main_with_args;

    #[test]
    fn main_with_version_succeeds() {
        assert_eq!(main_with_args(["msflagstats", "--version"]), 0);
    }

    #[test]
    fn main_with_help_succeeds() {
        assert_eq!(main_with_args(["msflagstats", "--help"]), 0);
    }

    #[test]
    fn main_with_dry_run_doesnt_crash() {
        let tmp_dir = tempdir().unwrap();
        fs::create_dir(tmp_dir.path().join("1088285600.ms")).unwrap();

        #[rustfmt::skip]
        assert_eq!(
            main_with_args([
                "msflagstats",
                "--base-dir", tmp_dir.path().to_str().unwrap(),
                "--dry-run",
            ]),
            0
        );
    }

    #[test]
    fn main_with_bad_arg_returns_1() {
        #[rustfmt::skip]
        assert_ne!(
            main_with_args([
                "msflagstats",
                "--select", "not-a-number",
                "--base-dir", ".",
            ]),
            0
        );
    }

    #[test]
    fn main_with_missing_base_dir_returns_1() {
        let tmp_dir = tempdir().unwrap();
        let missing = tmp_dir.path().join("missing");

        assert_ne!(
            main_with_args(["msflagstats", "--base-dir", missing.to_str().unwrap()]),
            0
        );
    }

    #[test]
    fn main_with_missing_dataset_returns_1() {
        let tmp_dir = tempdir().unwrap();
        let missing = tmp_dir.path().join("missing.ms");

        assert_eq!(
            main_with_args([
                "msflagstats",
                "--no-draw-progress",
                missing.to_str().unwrap()
            ]),
            1
        );
    }
}
