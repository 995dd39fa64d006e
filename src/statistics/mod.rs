//! Statistical reductions over one axis of an array
//!
//! # Organization
//!
//! - [`operations`]: the available operations and the [`StatisticalReduction`] trait
//! - [`parallel`]: lane-parallel implementations on the rayon pool

pub mod operations;
pub mod parallel;

pub use operations::{StatOperation, StatisticalReduction};
pub use parallel::{parallel_max_axis, parallel_mean_axis, parallel_min_axis, parallel_sum_axis};
