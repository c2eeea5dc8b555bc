#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! msflagstats reports what fraction of a radio interferometer dataset has
//! been flagged, broken down by antenna, by scan and by frequency channel and
//! polarization.
//!
//! # Examples
//!
//! Here's an example of how to compute the flag statistics of a small
//! in-memory dataset.
//!
//! ```rust
//! use msflagstats::{
//!     assemble_report,
//!     engine::{MemoryTable, VisRow},
//!     ndarray::Array2,
//!     FlagCounts, ReportContext,
//! };
//!
//! let mut table = MemoryTable::new("example.ms")
//!     .with_antennas(&["Tile011", "Tile012", "Tile013"])
//!     .with_fields(&["3C286"])
//!     .with_spectral_window("SPW0", vec![150e6, 151e6], vec![1e6, 1e6])
//!     .with_polarization(vec![9, 12])
//!     .with_data_description(0, 0);
//!
//! // one flagged baseline, one clear baseline and a flagged autocorrelation
//! table.push_row(VisRow::new(0, 1, 1, Array2::from_elem((2, 2), true)));
//! table.push_row(VisRow::new(0, 2, 1, Array2::from_elem((2, 2), false)));
//! table.push_row(VisRow::new(1, 1, 1, Array2::from_elem((2, 2), true)));
//!
//! let report = assemble_report(&table, &ReportContext::default()).unwrap();
//! let stats = report.flag_stats.unwrap();
//!
//! // antenna 0 is in both baselines, the autocorrelation is ignored
//! let antennas = stats.antennas.unwrap();
//! assert_eq!(antennas[0].counts, FlagCounts::new(4, 4));
//! assert_eq!(antennas[1].counts, FlagCounts::new(4, 0));
//!
//! // the global fraction includes the autocorrelation
//! let global = stats.global.unwrap().into_result().unwrap();
//! assert_eq!(global.flagged_points, 8);
//! assert_eq!(global.total_points, 12);
//! ```
//!
//! # Details
//!
//! Counting is delegated to a [`engine::VisTable`], which executes typed
//! grouped boolean-count requests. Measurement sets are read with
//! [`rubbl_casatables`] through [`engine::MsTable`].

use lazy_static::lazy_static;
use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

pub use marlu::{ndarray, rayon, rubbl_casatables};

pub mod batch;
pub mod channel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod constants;
pub mod counter;
pub mod engine;
pub mod error;
pub mod fold;
pub mod global;
pub mod histogram;
pub mod metadata;
pub mod report;
pub mod scan;
pub mod stats;
pub mod test_common;

pub use batch::{BatchConfig, BatchConfigBuilder, Selection, SortOrder};
pub use error::{FlagStatsError, ReportError, Stage, StatsError};
pub use global::GlobalOutcome;
pub use metadata::DatasetMetadata;
pub use report::{
    assemble_report, CancelFlag, DatasetFlagReport, FlagStatistics, ReportContext,
    ReportContextBuilder,
};
pub use stats::{AntennaStat, ChannelCorrelationStat, FlagCounts, GlobalStat, ScanStat};

lazy_static! {
    static ref DURATIONS: Mutex<HashMap<String, Duration>> = Mutex::new(HashMap::new());
}

/// Add `duration` to the running total for `name`.
#[doc(hidden)]
pub fn increment_duration(name: &str, duration: Duration) {
    let mut durations = DURATIONS.lock().unwrap_or_else(PoisonError::into_inner);
    *durations.entry(name.to_string()).or_default() += duration;
}

/// A snapshot of the accumulated duration of every named stage so far.
pub fn get_durations() -> HashMap<String, Duration> {
    DURATIONS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Evaluate an expression, adding the time it took to the running total for
/// `$name`.
#[macro_export]
macro_rules! with_increment_duration {
    ($name:expr, $body:expr) => {{
        let _now = std::time::Instant::now();
        let _res = $body;
        $crate::increment_duration($name, _now.elapsed());
        _res
    }};
}
