//! Discovering, selecting and processing a batch of measurement sets.

use std::{
    cmp::Ordering,
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
    time::SystemTime,
};

use derive_builder::Builder;
use glob::glob;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info, warn};

use crate::{
    constants::MS_GLOB_PATTERN,
    engine::{EngineError, VisTable},
    error::{CLIError, FlagStatsError},
    rayon::prelude::*,
    report::{assemble_report, DatasetFlagReport, ReportContext},
};

/// The order datasets are listed and processed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// by directory name
    Name,
    /// oldest modification time first
    #[default]
    ModifiedTime,
    /// the order the filesystem returns
    Unsorted,
}

impl FromStr for SortOrder {
    type Err = CLIError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortOrder::Name),
            "mtime" | "modified" | "modifiedtime" => Ok(SortOrder::ModifiedTime),
            "none" | "unsorted" => Ok(SortOrder::Unsorted),
            _ => Err(CLIError::InvalidCommandLineArgument {
                option: "--sort".into(),
                expected: "one of name, mtime, unsorted".into(),
                received: s.into(),
            }),
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SortOrder::Name => "name",
                SortOrder::ModifiedTime => "mtime",
                SortOrder::Unsorted => "unsorted",
            }
        )
    }
}

/// Which of the discovered datasets to process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// every dataset
    #[default]
    All,
    /// 1-based positions in the sorted listing
    Numbers(Vec<usize>),
}

/// Options for finding and processing a batch of measurement sets
#[derive(Builder, Debug, Clone)]
pub struct BatchConfig {
    /// The directory to search for `*.ms` directories. Takes precedence over
    /// `datasets`.
    #[builder(default, setter(into, strip_option))]
    pub base_dir: Option<PathBuf>,
    /// Datasets given explicitly, processed in the order given
    #[builder(default)]
    pub datasets: Vec<PathBuf>,
    /// How the discovered datasets are ordered
    #[builder(default)]
    pub sort_order: SortOrder,
    /// Whether to process the datasets, or only list them
    #[builder(default = "true")]
    pub process: bool,
    /// Which datasets to process
    #[builder(default)]
    pub selection: Selection,
    /// Whether datasets are processed in parallel
    #[builder(default = "false")]
    pub parallel_datasets: bool,
    /// Whether to draw progress bars
    #[builder(default = "true")]
    pub draw_progress: bool,
}

impl Display for BatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(base_dir) = &self.base_dir {
            writeln!(f, "Base directory:       {}", base_dir.display())?;
            writeln!(f, "Sort order:           {}", self.sort_order)?;
            match &self.selection {
                Selection::All => writeln!(f, "Selection:            all")?,
                Selection::Numbers(numbers) => writeln!(f, "Selection:            {numbers:?}")?,
            }
        }
        writeln!(
            f,
            "{} process datasets{}.",
            if self.process { "Will" } else { "Will not" },
            if self.parallel_datasets {
                " in parallel"
            } else {
                ""
            }
        )?;
        Ok(())
    }
}

impl BatchConfig {
    /// The datasets this batch should process: those discovered and selected
    /// in `base_dir` if it is set, otherwise `datasets`.
    ///
    /// # Errors
    ///
    /// - [`FlagStatsError::NoDatasetsGiven`] if there is neither a base
    ///   directory nor any explicit dataset
    /// - [`FlagStatsError::BadBaseDir`] if the base directory can't be listed
    /// - [`FlagStatsError::NoDatasetsFound`] if it holds no measurement sets
    /// - [`FlagStatsError::NoDatasetsSelected`] if the selection is empty
    pub fn resolve_datasets(&self) -> Result<Vec<PathBuf>, FlagStatsError> {
        let base_dir = match &self.base_dir {
            Some(base_dir) => base_dir,
            None if self.datasets.is_empty() => return Err(FlagStatsError::NoDatasetsGiven),
            None => return Ok(self.datasets.clone()),
        };
        let datasets = discover_datasets(base_dir, self.sort_order)?;
        if datasets.is_empty() {
            return Err(FlagStatsError::NoDatasetsFound(base_dir.clone()));
        }
        for (idx, path) in datasets.iter().enumerate() {
            info!("{:4}: {}", idx + 1, path.display());
        }
        select_datasets(datasets, &self.selection)
    }

    /// Report on already resolved `datasets`, in parallel if
    /// `parallel_datasets` is set.
    ///
    /// Returns `None` without opening anything if `process` is not set.
    pub fn process_resolved<T, F>(
        &self,
        datasets: &[PathBuf],
        open: F,
        ctx: &ReportContext,
    ) -> Option<BatchSummary>
    where
        T: VisTable,
        F: Fn(&Path) -> Result<T, EngineError> + Sync,
    {
        if !self.process {
            info!("listing only, {} datasets not processed", datasets.len());
            return None;
        }
        Some(process_datasets(
            datasets,
            open,
            ctx,
            self.parallel_datasets,
            self.draw_progress,
        ))
    }

    /// Resolve the datasets of this batch, then report on them as
    /// [`BatchConfig::process_resolved`] does.
    ///
    /// # Errors
    ///
    /// See [`BatchConfig::resolve_datasets`]. Failures of single datasets are
    /// recorded in the summary instead.
    pub fn run<T, F>(
        &self,
        open: F,
        ctx: &ReportContext,
    ) -> Result<Option<BatchSummary>, FlagStatsError>
    where
        T: VisTable,
        F: Fn(&Path) -> Result<T, EngineError> + Sync,
    {
        let datasets = self.resolve_datasets()?;
        Ok(self.process_resolved(&datasets, open, ctx))
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}

/// List the `*.ms` directories directly inside `base_dir`.
///
/// # Errors
///
/// - [`FlagStatsError::BadBaseDir`] if `base_dir` is not a directory
/// - [`FlagStatsError::Glob`] if the path can't be made into a pattern
pub fn discover_datasets(
    base_dir: &Path,
    sort_order: SortOrder,
) -> Result<Vec<PathBuf>, FlagStatsError> {
    if !base_dir.is_dir() {
        return Err(FlagStatsError::BadBaseDir(base_dir.to_path_buf()));
    }
    let pattern = base_dir.join(MS_GLOB_PATTERN);
    let mut datasets: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|path| path.is_dir())
        .collect();
    match sort_order {
        SortOrder::Name => datasets.sort_by(|a, b| a.file_name().cmp(&b.file_name())),
        SortOrder::ModifiedTime => datasets.sort_by(|a, b| {
            let by_time = match (modified_time(a), modified_time(b)) {
                (Some(ta), Some(tb)) => ta.cmp(&tb),
                _ => Ordering::Equal,
            };
            by_time.then_with(|| a.cmp(b))
        }),
        SortOrder::Unsorted => {}
    }
    debug!("found {} datasets in {}", datasets.len(), base_dir.display());
    Ok(datasets)
}

/// Apply a [`Selection`] to a sorted listing. Numbers are 1-based; numbers
/// outside the listing are ignored with a warning.
///
/// # Errors
///
/// [`FlagStatsError::NoDatasetsSelected`] if nothing is left.
pub fn select_datasets(
    datasets: Vec<PathBuf>,
    selection: &Selection,
) -> Result<Vec<PathBuf>, FlagStatsError> {
    let numbers = match selection {
        Selection::All => return Ok(datasets),
        Selection::Numbers(numbers) => numbers,
    };
    let selected: Vec<PathBuf> = numbers
        .iter()
        .filter_map(|&number| match number.checked_sub(1).and_then(|i| datasets.get(i)) {
            Some(path) => Some(path.clone()),
            None => {
                warn!(
                    "ignoring selection {}, there are only {} datasets",
                    number,
                    datasets.len()
                );
                None
            }
        })
        .collect();
    if selected.is_empty() {
        return Err(FlagStatsError::NoDatasetsSelected {
            selection: numbers.clone(),
            num_available: datasets.len(),
        });
    }
    Ok(selected)
}

/// The result of processing one dataset of a batch.
#[derive(Debug)]
pub struct DatasetOutcome {
    /// the dataset path
    pub path: PathBuf,
    /// its report, or why there isn't one
    pub result: Result<DatasetFlagReport, FlagStatsError>,
}

/// The results of a whole batch, in input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// one outcome per dataset
    pub outcomes: Vec<DatasetOutcome>,
}

impl BatchSummary {
    /// The number of datasets which failed.
    pub fn num_failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// The successful reports.
    pub fn reports(&self) -> impl Iterator<Item = &DatasetFlagReport> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    /// `Ok` if every dataset succeeded.
    ///
    /// # Errors
    ///
    /// [`FlagStatsError::BatchFailed`] otherwise.
    pub fn check(&self) -> Result<(), FlagStatsError> {
        match self.num_failed() {
            0 => Ok(()),
            num_failed => Err(FlagStatsError::BatchFailed {
                num_failed,
                num_datasets: self.outcomes.len(),
            }),
        }
    }
}

fn process_one<T, F>(path: &Path, open: &F, ctx: &ReportContext) -> DatasetOutcome
where
    T: VisTable,
    F: Fn(&Path) -> Result<T, EngineError>,
{
    let result = open(path)
        .map_err(FlagStatsError::from)
        .and_then(|table| assemble_report(&table, ctx).map_err(FlagStatsError::from));
    if let Err(e) = &result {
        error!("{}: {}", path.display(), e);
    }
    DatasetOutcome {
        path: path.to_path_buf(),
        result,
    }
}

/// Open and report on each dataset in turn. A failure is recorded in the
/// summary and the batch moves on to the next dataset. Each table is dropped
/// as soon as its report is done.
pub fn process_datasets<T, F>(
    paths: &[PathBuf],
    open: F,
    ctx: &ReportContext,
    parallel: bool,
    draw_progress: bool,
) -> BatchSummary
where
    T: VisTable,
    F: Fn(&Path) -> Result<T, EngineError> + Sync,
{
    let draw_target = if draw_progress {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };
    let progress = ProgressBar::with_draw_target(Some(paths.len() as u64), draw_target)
        .with_style(
            ProgressStyle::default_bar()
                .template(
                    "{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})",
                )
                .map(|style| style.progress_chars("=> "))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
        .with_position(0)
        .with_message("datasets");

    let outcomes = if parallel {
        paths
            .par_iter()
            .map(|path| {
                let outcome = process_one(path, &open, ctx);
                progress.inc(1);
                outcome
            })
            .collect()
    } else {
        paths
            .iter()
            .map(|path| {
                let outcome = process_one(path, &open, ctx);
                progress.inc(1);
                outcome
            })
            .collect()
    };
    progress.finish();
    BatchSummary { outcomes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::MemoryTable, test_common::get_baseline_scenario_table};
    use std::{
        fs,
        sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
    };
    use tempfile::tempdir;

    fn make_datasets(dir: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir(dir.join(name)).unwrap();
        }
        fs::write(dir.join("notes.ms"), "not a directory").unwrap();
        fs::create_dir(dir.join("other_dir")).unwrap();
    }

    #[test]
    fn test_discover_by_name() {
        let tmp_dir = tempdir().unwrap();
        make_datasets(tmp_dir.path(), &["c.ms", "a.ms", "b.ms"]);
        let datasets = discover_datasets(tmp_dir.path(), SortOrder::Name).unwrap();
        let names = datasets
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.ms", "b.ms", "c.ms"]);
    }

    #[test]
    fn test_discover_by_mtime_keeps_every_dataset() {
        let tmp_dir = tempdir().unwrap();
        make_datasets(tmp_dir.path(), &["x.ms", "y.ms"]);
        let datasets = discover_datasets(tmp_dir.path(), SortOrder::ModifiedTime).unwrap();
        assert_eq!(datasets.len(), 2);
    }

    #[test]
    fn test_discover_bad_base_dir() {
        let tmp_dir = tempdir().unwrap();
        let missing = tmp_dir.path().join("missing");
        assert!(matches!(
            discover_datasets(&missing, SortOrder::Name),
            Err(FlagStatsError::BadBaseDir(_))
        ));
    }

    #[test]
    fn test_select_numbers() {
        let datasets = vec![
            PathBuf::from("a.ms"),
            PathBuf::from("b.ms"),
            PathBuf::from("c.ms"),
        ];
        let selected =
            select_datasets(datasets.clone(), &Selection::Numbers(vec![3, 0, 1, 9])).unwrap();
        assert_eq!(selected, vec![PathBuf::from("c.ms"), PathBuf::from("a.ms")]);
        assert_eq!(
            select_datasets(datasets.clone(), &Selection::All).unwrap(),
            datasets
        );
        assert!(matches!(
            select_datasets(datasets, &Selection::Numbers(vec![4, 5])),
            Err(FlagStatsError::NoDatasetsSelected {
                num_available: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_resolve_empty_dir() {
        let tmp_dir = tempdir().unwrap();
        let config = BatchConfigBuilder::default()
            .base_dir(tmp_dir.path())
            .build()
            .unwrap();
        assert!(matches!(
            config.resolve_datasets(),
            Err(FlagStatsError::NoDatasetsFound(_))
        ));
    }

    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfigBuilder::default()
            .base_dir("/data")
            .build()
            .unwrap();
        assert_eq!(config.base_dir, Some(PathBuf::from("/data")));
        assert!(config.datasets.is_empty());
        assert_eq!(config.sort_order, SortOrder::ModifiedTime);
        assert!(config.process);
        assert_eq!(config.selection, Selection::All);
        assert!(!config.parallel_datasets);
        assert!(config.draw_progress);
    }

    #[test]
    fn test_resolve_explicit_datasets() {
        let paths = vec![PathBuf::from("b.ms"), PathBuf::from("a.ms")];
        let config = BatchConfigBuilder::default()
            .datasets(paths.clone())
            .build()
            .unwrap();
        assert_eq!(config.resolve_datasets().unwrap(), paths);

        let config = BatchConfigBuilder::default().build().unwrap();
        assert!(matches!(
            config.resolve_datasets(),
            Err(FlagStatsError::NoDatasetsGiven)
        ));
    }

    #[test]
    fn test_listing_only_opens_nothing() {
        let tmp_dir = tempdir().unwrap();
        make_datasets(tmp_dir.path(), &["a.ms", "b.ms"]);
        let config = BatchConfigBuilder::default()
            .base_dir(tmp_dir.path())
            .process(false)
            .draw_progress(false)
            .build()
            .unwrap();
        let num_opened = AtomicUsize::new(0);
        let open = |_: &Path| -> Result<MemoryTable, EngineError> {
            num_opened.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(get_baseline_scenario_table())
        };
        assert!(config
            .run(open, &ReportContext::default())
            .unwrap()
            .is_none());
        assert_eq!(num_opened.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_run_processes_every_dataset() {
        let tmp_dir = tempdir().unwrap();
        make_datasets(tmp_dir.path(), &["a.ms", "b.ms", "c.ms"]);
        for parallel in [false, true] {
            let config = BatchConfigBuilder::default()
                .base_dir(tmp_dir.path())
                .sort_order(SortOrder::Name)
                .selection(Selection::Numbers(vec![1, 3]))
                .parallel_datasets(parallel)
                .draw_progress(false)
                .build()
                .unwrap();
            let summary = config
                .run(open_fixture, &ReportContext::default())
                .unwrap()
                .unwrap();
            let paths = summary
                .outcomes
                .iter()
                .map(|o| o.path.clone())
                .collect::<Vec<_>>();
            assert_eq!(
                paths,
                vec![tmp_dir.path().join("a.ms"), tmp_dir.path().join("c.ms")]
            );
            assert!(summary.check().is_ok());
        }
    }

    #[test]
    fn test_sort_order_from_str() {
        assert_eq!("name".parse::<SortOrder>().unwrap(), SortOrder::Name);
        assert_eq!("MTIME".parse::<SortOrder>().unwrap(), SortOrder::ModifiedTime);
        assert_eq!("unsorted".parse::<SortOrder>().unwrap(), SortOrder::Unsorted);
        assert!("size".parse::<SortOrder>().is_err());
    }

    fn open_fixture(path: &Path) -> Result<MemoryTable, EngineError> {
        if path.ends_with("bad.ms") {
            Err(EngineError::BadPath(path.to_path_buf()))
        } else {
            Ok(get_baseline_scenario_table())
        }
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let paths = vec![
            PathBuf::from("good.ms"),
            PathBuf::from("bad.ms"),
            PathBuf::from("also_good.ms"),
        ];
        for parallel in [false, true] {
            let summary = process_datasets(
                &paths,
                open_fixture,
                &ReportContext::default(),
                parallel,
                false,
            );
            assert_eq!(summary.outcomes.len(), 3);
            assert_eq!(summary.num_failed(), 1);
            assert!(summary.outcomes[1].result.is_err());
            assert_eq!(summary.reports().count(), 2);
            assert!(matches!(
                summary.check(),
                Err(FlagStatsError::BatchFailed {
                    num_failed: 1,
                    num_datasets: 3
                })
            ));
        }
    }
}
