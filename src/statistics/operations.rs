//! Core statistical operations and traits
//!
//! This module defines the statistics available to the resampler for ordinary
//! (non-temporal) variables.

use crate::errors::{Result, SplitVarError};
use ndarray::ArrayD;
use std::fmt;
use std::str::FromStr;

/// Supported statistical operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatOperation {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Sum of values
    Sum,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl StatOperation {
    /// Get the string representation of the operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl FromStr for StatOperation {
    type Err = SplitVarError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            "min" | "minimum" => Ok(Self::Min),
            "max" | "maximum" => Ok(Self::Max),
            other => Err(SplitVarError::StatisticsError(format!(
                "Unknown reduction '{other}', expected one of mean, sum, min, max"
            ))),
        }
    }
}

impl fmt::Display for StatOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for types that can perform statistical reductions along an axis
pub trait StatisticalReduction<T> {
    /// Perform a statistical reduction along the specified axis
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is out of bounds for the array.
    fn reduce_along_axis(&self, axis: usize, operation: StatOperation) -> Result<ArrayD<T>>;
}

impl StatisticalReduction<f64> for ArrayD<f64> {
    fn reduce_along_axis(&self, axis: usize, operation: StatOperation) -> Result<ArrayD<f64>> {
        if axis >= self.ndim() {
            return Err(SplitVarError::StatisticsError(format!(
                "Axis {axis} is out of bounds for array with {} dimensions",
                self.ndim()
            )));
        }

        match operation {
            StatOperation::Mean => super::parallel::parallel_mean_axis(self, axis),
            StatOperation::Sum => super::parallel::parallel_sum_axis(self, axis),
            StatOperation::Min => super::parallel::parallel_min_axis(self, axis),
            StatOperation::Max => super::parallel::parallel_max_axis(self, axis),
        }
    }
}
