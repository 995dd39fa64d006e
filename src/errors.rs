//! Centralized error handling for splitvar
//!
//! Every fallible operation in the library returns [`Result`], whose error type
//! names the failing variable, dimension or frequency so the command line can
//! report a precise message.

use crate::calendar::format_interval;
use thiserror::Error;

/// Main error type for splitvar operations
#[derive(Debug, Error)]
pub enum SplitVarError {
    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),

    /// I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Array shape or dimension error
    #[error("Array error: {0}")]
    ArrayError(#[from] ndarray::ShapeError),

    /// The combined variable-name pattern could not be compiled
    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    /// Variable not found in the dataset
    #[error("Variable '{var}' not found in dataset")]
    VariableNotFound { var: String },

    /// Dimension not found in variable
    #[error("Dimension '{dim}' not found in variable '{var}'")]
    DimensionNotFound { var: String, dim: String },

    /// A variable disagrees with the dataset about a dimension length
    #[error("Dimension '{dim}' has length {expected} but variable '{var}' has length {found}")]
    DimensionMismatch {
        var: String,
        dim: String,
        expected: usize,
        found: usize,
    },

    /// Variable rank not supported by the writer for unlimited dimensions
    #[error("Cannot write variable '{var}' of rank {rank} along an unlimited dimension (max 4)")]
    UnsupportedRank { var: String, rank: usize },

    /// The dataset has no decodable time coordinate
    #[error("No time coordinate found in dataset")]
    NoTimeCoordinate,

    /// The `units` attribute of a time variable is not `<unit> since <date>`
    #[error("Invalid time units '{units}': {reason}")]
    InvalidTimeUnits { units: String, reason: String },

    /// Calendar name not supported by the normalizer
    #[error("Unsupported calendar '{0}'")]
    UnsupportedCalendar(String),

    /// A calendar date with no Gregorian equivalent
    #[error("Date {date} of the {calendar} calendar has no Gregorian equivalent")]
    InvalidDate { date: String, calendar: String },

    /// Frequency string could not be parsed
    #[error("Invalid frequency '{0}'")]
    InvalidFrequency(String),

    /// Requested split or resample frequency is finer than the data itself
    #[error(
        "Split frequency ({frequency}) is higher than data frequency ({}): not supported",
        format_interval(.data_interval)
    )]
    FrequencyTooFine {
        frequency: String,
        data_interval: chrono::Duration,
    },

    /// Time values go backwards
    #[error("Time axis '{dim}' is not monotonically increasing at index {index}")]
    NonMonotonicTime { dim: String, index: usize },

    /// Input files encode time differently and cannot be concatenated
    #[error("Time units differ between input files: '{first}' and '{other}'")]
    InconsistentTimeUnits { first: String, other: String },

    /// Output file name time format is not a valid strftime string
    #[error("Invalid time format '{0}'")]
    InvalidTimeFormat(String),

    /// Nothing to split
    #[error("No input files given")]
    NoInputFiles,

    /// Thread pool configuration error
    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    /// Statistics computation errors
    #[error("Statistics computation error: {0}")]
    StatisticsError(String),
}

/// Result type alias for splitvar operations
pub type Result<T> = std::result::Result<T, SplitVarError>;
