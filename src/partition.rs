//! Splitting a time series into calendar periods
//!
//! Periods are anchored at the first sample (see [`Frequency::period_key`])
//! and only non-empty periods produce a chunk. Months, years and intervals are
//! those of the time axis' own calendar. Windows are computed eagerly so
//! configuration errors surface before the first chunk; the chunks themselves
//! are sliced lazily as the iterators are pulled.

use crate::calendar::{CalendarDateTime, TimeAxis};
use crate::dataset::{Dataset, Variable};
use crate::errors::{Result, SplitVarError};
use crate::frequency::Frequency;
use chrono::Duration;
use std::ops::Range;
use std::vec::IntoIter;

/// Fail when `frequency` is finer than the sampling interval of `times`.
///
/// Series with fewer than two samples have no interval and always pass.
pub fn check_frequency(times: &[CalendarDateTime], frequency: &Frequency) -> Result<()> {
    let nominal = frequency.nominal_duration()?;
    match min_interval(times)? {
        Some(interval) if nominal < interval => Err(SplitVarError::FrequencyTooFine {
            frequency: frequency.to_string(),
            data_interval: interval,
        }),
        _ => Ok(()),
    }
}

fn check_monotonic(times: &[CalendarDateTime], dim: &str) -> Result<()> {
    let positions = positions(times)?;
    match positions.windows(2).position(|pair| pair[1] < pair[0]) {
        Some(index) => Err(SplitVarError::NonMonotonicTime {
            dim: dim.to_string(),
            index: index + 1,
        }),
        None => Ok(()),
    }
}

/// Index ranges of the non-empty periods of `frequency`, in temporal order
pub fn time_windows(times: &[CalendarDateTime], frequency: &Frequency, dim: &str) -> Result<Vec<Range<usize>>> {
    check_monotonic(times, dim)?;
    check_frequency(times, frequency)?;

    let Some(origin) = times.first() else {
        return Ok(Vec::new());
    };
    let mut windows = Vec::new();
    let mut start = 0;
    let mut current = frequency.period_key(origin, origin)?;
    for (index, t) in times.iter().enumerate().skip(1) {
        let key = frequency.period_key(origin, t)?;
        if key != current {
            windows.push(start..index);
            start = index;
            current = key;
        }
    }
    windows.push(start..times.len());
    Ok(windows)
}

/// Chunks of a dataset, one per period
#[derive(Debug)]
pub struct TimeGroups<'a> {
    dataset: &'a Dataset,
    dim: String,
    windows: IntoIter<Range<usize>>,
}

impl TimeGroups<'_> {
    /// Name of the dimension being split
    pub fn dim(&self) -> &str {
        &self.dim
    }
}

impl Iterator for TimeGroups<'_> {
    type Item = Dataset;

    fn next(&mut self) -> Option<Dataset> {
        let window = self.windows.next()?;
        Some(self.dataset.slice_along(&self.dim, window))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.windows.size_hint()
    }
}

impl ExactSizeIterator for TimeGroups<'_> {}

/// Split `dataset` along its time dimension.
///
/// Every variable with the time dimension is sliced; the others are carried
/// into each chunk whole.
pub fn group_by_time<'a>(dataset: &'a Dataset, frequency: &Frequency) -> Result<TimeGroups<'a>> {
    let axis = dataset.time_axis()?;
    let windows = time_windows(&axis.values, frequency, &axis.dim)?;
    Ok(TimeGroups {
        dataset,
        dim: axis.dim,
        windows: windows.into_iter(),
    })
}

/// Chunks of a single variable, one per period
#[derive(Debug)]
pub struct VariableGroups<'a> {
    variable: &'a Variable,
    dim: String,
    windows: IntoIter<Range<usize>>,
}

impl Iterator for VariableGroups<'_> {
    type Item = Variable;

    fn next(&mut self) -> Option<Variable> {
        let window = self.windows.next()?;
        Some(self.variable.slice_along(&self.dim, window))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.windows.size_hint()
    }
}

impl ExactSizeIterator for VariableGroups<'_> {}

/// Split one variable along `axis`, which must be one of its dimensions
pub fn group_variable_by_time<'a>(
    variable: &'a Variable,
    axis: &TimeAxis,
    frequency: &Frequency,
) -> Result<VariableGroups<'a>> {
    match variable.dim_len(&axis.dim) {
        Some(len) if len == axis.len() => {}
        Some(len) => {
            return Err(SplitVarError::DimensionMismatch {
                var: variable.name().to_string(),
                dim: axis.dim.clone(),
                expected: axis.len(),
                found: len,
            })
        }
        None => {
            return Err(SplitVarError::DimensionNotFound {
                var: variable.name().to_string(),
                dim: axis.dim.clone(),
            })
        }
    }
    let windows = time_windows(&axis.values, frequency, &axis.dim)?;
    Ok(VariableGroups {
        variable,
        dim: axis.dim.clone(),
        windows: windows.into_iter(),
    })
}

/// Smallest spacing between consecutive samples, if there are at least two
pub fn min_interval(times: &[CalendarDateTime]) -> Result<Option<Duration>> {
    let positions = positions(times)?;
    Ok(positions.windows(2).map(|pair| pair[1] - pair[0]).min())
}

fn positions(times: &[CalendarDateTime]) -> Result<Vec<Duration>> {
    times.iter().map(CalendarDateTime::elapsed).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{Calendar, TimeUnits};

    fn daily(n: usize) -> Vec<CalendarDateTime> {
        let units = TimeUnits::parse("days since 2000-01-30 12:00:00", Calendar::Standard).unwrap();
        (0..n).map(|i| units.decode(i as f64).unwrap()).collect()
    }

    #[test]
    fn backwards_time_is_rejected() {
        let mut times = daily(3);
        times.swap(1, 2);
        let freq: Frequency = "1D".parse().unwrap();
        assert!(matches!(
            time_windows(&times, &freq, "time"),
            Err(SplitVarError::NonMonotonicTime { index: 2, .. })
        ));
    }

    #[test]
    fn single_sample_yields_one_window() {
        let freq: Frequency = "1H".parse().unwrap();
        assert_eq!(time_windows(&daily(1), &freq, "time").unwrap(), vec![0..1]);
        assert!(time_windows(&[], &freq, "time").unwrap().is_empty());
    }

    #[test]
    fn months_split_at_calendar_boundaries() {
        let freq: Frequency = "MS".parse().unwrap();
        let windows = time_windows(&daily(4), &freq, "time").unwrap();
        assert_eq!(windows, vec![0..2, 2..4]);
    }

    #[test]
    fn smallest_gap_is_the_data_interval() {
        let units = TimeUnits::parse("hours since 2000-02-29", Calendar::Day360).unwrap();
        let times: Vec<CalendarDateTime> = [0.0, 24.0, 30.0, 54.0].iter().map(|&h| units.decode(h).unwrap()).collect();
        assert_eq!(min_interval(&times).unwrap(), Some(Duration::hours(6)));
        assert_eq!(min_interval(&times[..1]).unwrap(), None);
    }
}
