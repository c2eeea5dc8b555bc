//! Useful constants.

/// Correlation product labels, indexed by the casacore `Stokes::StokesTypes`
/// code found in `POLARIZATION::CORR_TYPE`.
pub const STOKES_LABELS: [&str; 33] = [
    "Undefined",
    "I",
    "Q",
    "U",
    "V",
    "RR",
    "RL",
    "LR",
    "LL",
    "XX",
    "XY",
    "YX",
    "YY",
    "RX",
    "RY",
    "LX",
    "LY",
    "XR",
    "XL",
    "YR",
    "YL",
    "PP",
    "PQ",
    "QP",
    "QQ",
    "RCircular",
    "LCircular",
    "Linear",
    "Ptotal",
    "Plinear",
    "PFtotal",
    "PFlinear",
    "Pangle",
];

/// Column position of the flagged series used for the histogram, counted from
/// the channel frequency column.
pub const HISTOGRAM_FLAGGED_COLUMN_IDX: usize = 2;

/// Column position of the total series used for the histogram.
pub const HISTOGRAM_TOTAL_COLUMN_IDX: usize = 4;

/// Pattern used to discover measurement sets in a base directory.
pub const MS_GLOB_PATTERN: &str = "*.ms";

/// Columns of a freshly created in-memory main table.
pub const MAIN_TABLE_COLUMNS: [&str; 8] = [
    "ANTENNA1",
    "ANTENNA2",
    "DATA_DESC_ID",
    "FIELD_ID",
    "FLAG",
    "FLAG_ROW",
    "SCAN_NUMBER",
    "TIME",
];
