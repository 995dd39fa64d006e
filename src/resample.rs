//! Aggregating a time series to a coarser frequency
//!
//! Each period of the target frequency is reduced to a single time step. The
//! reduction is chosen from the variable's [`TemporalKind`]: time spans are
//! summed, time points collapse to the envelope of the period, and ordinary
//! fields use the requested statistic.

use crate::dataset::{Dataset, TemporalKind, Variable};
use crate::errors::{Result, SplitVarError};
use crate::frequency::Frequency;
use crate::partition::time_windows;
use crate::statistics::{parallel_sum_axis, StatOperation, StatisticalReduction};
use log::debug;
use ndarray::{ArrayD, Axis, Slice};
use std::ops::Range;
use std::vec::IntoIter;

/// How one variable is collapsed over a period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Total over the period
    Sum,
    /// First lower bound and last upper bound, or the last instant
    Envelope,
    Statistic(StatOperation),
}

impl Reduction {
    /// Reduction for a variable of `kind`, using `operation` for plain fields
    #[must_use]
    pub fn for_kind(kind: TemporalKind, operation: StatOperation) -> Self {
        match kind {
            TemporalKind::Duration => Self::Sum,
            TemporalKind::Instant => Self::Envelope,
            TemporalKind::Plain => Self::Statistic(operation),
        }
    }
}

/// Collapse `range` along `dim` to a single step.
///
/// Variables without `dim` are returned unchanged.
pub fn reduce_window(var: &Variable, dim: &str, range: Range<usize>, reduction: Reduction) -> Result<Variable> {
    let Some(axis) = var.axis_of(dim) else {
        return Ok(var.clone());
    };
    if range.is_empty() {
        return Err(SplitVarError::StatisticsError(format!(
            "Cannot reduce an empty window of '{}'",
            var.name()
        )));
    }
    let window = var.data().slice_axis(Axis(axis), Slice::from(range)).to_owned();

    let reduced = match reduction {
        Reduction::Sum => parallel_sum_axis(&window, axis)?,
        Reduction::Statistic(op) => window.reduce_along_axis(axis, op)?,
        Reduction::Envelope => envelope(&window, axis),
    };
    var.with_data(reduced.insert_axis(Axis(axis)))
}

/// Bounds arrays keep a trailing axis of length 2 holding (lower, upper)
fn envelope(window: &ArrayD<f64>, axis: usize) -> ArrayD<f64> {
    let steps = window.len_of(Axis(axis));
    let first = window.index_axis(Axis(axis), 0);
    let mut last = window.index_axis(Axis(axis), steps - 1).to_owned();

    let pair_axis = window.ndim() - 1;
    if pair_axis != axis && window.len_of(Axis(pair_axis)) == 2 {
        // Axis index shifts by one once the time axis is removed
        let reduced_pair_axis = Axis(pair_axis - 1);
        last.index_axis_mut(reduced_pair_axis, 0)
            .assign(&first.index_axis(reduced_pair_axis, 0));
    }
    last
}

/// Per-period reduced datasets
#[derive(Debug)]
pub struct Resampled<'a> {
    dataset: &'a Dataset,
    dim: String,
    operation: StatOperation,
    windows: IntoIter<Range<usize>>,
}

impl Resampled<'_> {
    fn reduce_period(&self, window: Range<usize>) -> Result<Dataset> {
        let mut reduced = self.dataset.clone_metadata();
        for var in self.dataset.variables() {
            let reduction = Reduction::for_kind(var.kind(), self.operation);
            let collapsed = reduce_window(var, &self.dim, window.clone(), reduction)?;
            if self.dataset.is_coordinate(var.name()) {
                reduced.add_coordinate(collapsed)?;
            } else {
                reduced.add_variable(collapsed)?;
            }
        }
        Ok(reduced)
    }
}

impl Iterator for Resampled<'_> {
    type Item = Result<Dataset>;

    fn next(&mut self) -> Option<Result<Dataset>> {
        let window = self.windows.next()?;
        Some(self.reduce_period(window))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.windows.size_hint()
    }
}

impl ExactSizeIterator for Resampled<'_> {}

/// Reduce `dataset` to one time step per period of `frequency`.
///
/// `primary` is the variable being exported; it must carry the time
/// dimension.
pub fn resample_by_time<'a>(
    dataset: &'a Dataset,
    primary: &str,
    frequency: &Frequency,
    operation: StatOperation,
) -> Result<Resampled<'a>> {
    let var = dataset
        .variable(primary)
        .ok_or_else(|| SplitVarError::VariableNotFound {
            var: primary.to_string(),
        })?;
    let axis = dataset.time_axis()?;
    if var.axis_of(&axis.dim).is_none() {
        return Err(SplitVarError::DimensionNotFound {
            var: primary.to_string(),
            dim: axis.dim,
        });
    }
    let windows = time_windows(&axis.values, frequency, &axis.dim)?;
    debug!("Resampling {primary} to {frequency}: {} periods", windows.len());
    Ok(Resampled {
        dataset,
        dim: axis.dim,
        operation,
        windows: windows.into_iter(),
    })
}

/// Resample `dataset` and join the periods back into one continuous series.
///
/// Attributes, encoding and temporal kind of every variable are kept.
pub fn resample_dataset(
    dataset: &Dataset,
    primary: &str,
    frequency: &Frequency,
    operation: StatOperation,
) -> Result<Dataset> {
    let periods = resample_by_time(dataset, primary, frequency, operation)?;
    let dim = periods.dim.clone();
    let parts = periods.collect::<Result<Vec<_>>>()?;
    if parts.is_empty() {
        return Ok(dataset.slice_along(&dim, 0..0));
    }
    Dataset::concat_along(parts, &dim)
}
