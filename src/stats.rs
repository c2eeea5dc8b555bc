//! Flag statistic value types.

use std::{
    iter::Sum,
    ops::{Add, AddAssign},
};

/// A pair of flagged and unflagged sample counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagCounts {
    /// number of flagged samples
    pub flagged: u64,
    /// number of unflagged samples
    pub clear: u64,
}

impl FlagCounts {
    /// Create a new `FlagCounts`.
    pub const fn new(flagged: u64, clear: u64) -> Self {
        Self { flagged, clear }
    }

    /// `flagged + clear`
    pub const fn total(&self) -> u64 {
        self.flagged + self.clear
    }

    /// Percentage of samples which are flagged, `None` if there are no samples.
    pub fn percentage(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(100.0 * self.flagged as f64 / total as f64),
        }
    }
}

impl Add for FlagCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.flagged + rhs.flagged, self.clear + rhs.clear)
    }
}

impl AddAssign for FlagCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.flagged += rhs.flagged;
        self.clear += rhs.clear;
    }
}

impl Sum for FlagCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a FlagCounts> for FlagCounts {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Flag counts of one antenna, summed over every cross-correlation baseline it
/// takes part in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntennaStat {
    /// row index in the ANTENNA table
    pub antenna_id: i64,
    /// antenna name
    pub name: String,
    /// flag counts
    pub counts: FlagCounts,
}

/// Flag counts of one scan, excluding self-correlations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStat {
    /// scan number
    pub scan_number: i64,
    /// the (lowest) field id observed during this scan
    pub field_id: i64,
    /// the name of that field
    pub field_name: String,
    /// flag counts
    pub counts: FlagCounts,
}

/// Flag counts of one channel of one correlation of a spectral window.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCorrelationStat {
    /// spectral window id
    pub spectral_window_id: i64,
    /// spectral window name
    pub spectral_window_name: String,
    /// channel index within the window
    pub channel_index: usize,
    /// channel centre frequency [Hz]
    pub channel_freq: f64,
    /// channel width [Hz]
    pub channel_width: f64,
    /// correlation label, e.g. `XX`
    pub correlation_label: String,
    /// flag counts
    pub counts: FlagCounts,
}

/// A single ratio over every flag of a dataset, self-correlations included.
///
/// `total_points` is rows × channels × correlations and is not expected to
/// match the totals of the grouped statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalStat {
    /// number of flagged points
    pub flagged_points: u64,
    /// number of points in the flag column
    pub total_points: u64,
    /// `100 * flagged_points / total_points`
    pub percentage: f64,
}
