//! Parallel computation implementations for statistical operations
//!
//! Each output element reduces one lane of the input along the requested
//! axis; lanes are processed on the rayon pool through ndarray's `Zip`.
//! Missing values (NaN) are skipped throughout.

use crate::errors::Result;
use ndarray::{ArrayD, ArrayView1, Axis, Zip};

fn reduce_lanes<F>(data: &ArrayD<f64>, axis: usize, reduce: F) -> Result<ArrayD<f64>>
where
    F: Fn(ArrayView1<'_, f64>) -> f64 + Sync + Send,
{
    let result = Zip::from(data.lanes(Axis(axis))).par_map_collect(|lane| reduce(lane));
    Ok(result)
}

/// Computes mean along an axis using parallel processing
///
/// A lane with no valid values yields NaN.
///
/// # Errors
///
/// Returns an error if the axis is invalid.
pub fn parallel_mean_axis(data: &ArrayD<f64>, axis: usize) -> Result<ArrayD<f64>> {
    reduce_lanes(data, axis, |lane| {
        let (sum, count) = lane
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0_f64, 0_u32), |(sum, count), &v| (sum + v, count + 1));
        if count > 0 {
            sum / f64::from(count)
        } else {
            f64::NAN
        }
    })
}

/// Computes sum along an axis; an all-missing lane sums to zero
///
/// # Errors
///
/// Returns an error if the axis is invalid.
pub fn parallel_sum_axis(data: &ArrayD<f64>, axis: usize) -> Result<ArrayD<f64>> {
    reduce_lanes(data, axis, |lane| lane.iter().filter(|v| !v.is_nan()).sum())
}

/// Computes minimum along an axis
///
/// # Errors
///
/// Returns an error if the axis is invalid.
pub fn parallel_min_axis(data: &ArrayD<f64>, axis: usize) -> Result<ArrayD<f64>> {
    reduce_lanes(data, axis, |lane| {
        lane.iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::min)
            .unwrap_or(f64::NAN)
    })
}

/// Computes maximum along an axis
///
/// # Errors
///
/// Returns an error if the axis is invalid.
pub fn parallel_max_axis(data: &ArrayD<f64>, axis: usize) -> Result<ArrayD<f64>> {
    reduce_lanes(data, axis, |lane| {
        lane.iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::max)
            .unwrap_or(f64::NAN)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn missing_values_are_skipped() {
        let data = array![[1.0, f64::NAN], [3.0, f64::NAN]].into_dyn();
        let mean = parallel_mean_axis(&data, 0).unwrap();
        assert_eq!(mean[[0]], 2.0);
        assert!(mean[[1]].is_nan());

        let sum = parallel_sum_axis(&data, 0).unwrap();
        assert_eq!(sum[[0]], 4.0);
        assert_eq!(sum[[1]], 0.0);

        assert_eq!(parallel_min_axis(&data, 1).unwrap()[[1]], 3.0);
        assert!(parallel_max_axis(&data, 0).unwrap()[[1]].is_nan());
    }
}
