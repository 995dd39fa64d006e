//! splitvar: split multi-file NetCDF model output by variable and time
//!
//! Climate model runs write many variables into each output file, usually one
//! file per model time step or restart interval. splitvar reorganizes such
//! output into one directory per variable, with one file per calendar period,
//! each holding the variable together with every coordinate, bounds and
//! auxiliary variable it references.
//!
//! ## Key Features
//!
//! - **Dependency Resolution**: References found in free-text attributes
//!   (`coordinates`, `bounds`, `cell_measures`, ...) and in dimensions are
//!   followed transitively, cycles included
//! - **Calendar Awareness**: `noleap`, `all_leap` and `360_day` time axes are
//!   decoded in their own calendar before periods are computed
//! - **Grouping and Resampling**: Split into periods as-is, or aggregate to a
//!   coarser frequency first, summing durations and keeping time bounds intact
//! - **Parallel Processing**: Input files are read and reductions run on Rayon
//!
//! ## Module Organization
//!
//! - [`calendar`] and [`frequency`]: time decoding and period arithmetic
//! - [`dataset`] and [`attributes`]: the in-memory data model
//! - [`dependencies`] and [`selection`]: which variables go into which file
//! - [`partition`] and [`resample`]: splitting and aggregating along time
//! - [`statistics`]: NaN-aware parallel reductions
//! - [`netcdf_io`] and [`metadata`]: reading, writing and chunk naming
//! - [`config`] and [`splitter`]: run settings and orchestration
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use splitvar::prelude::*;
//!
//! let config = SplitConfig::new(vec!["ocean_month.nc".into()])
//!     .with_frequency("12MS".parse().unwrap())
//!     .with_output_dir("split");
//! let summary = splitvar::splitter::split_files(&config).unwrap();
//! println!("wrote {} files", summary.total_chunks());
//! ```

// Core modules
pub mod attributes;
pub mod calendar;
pub mod config;
pub mod dataset;
pub mod dependencies;
pub mod errors;
pub mod frequency;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod partition;
pub mod resample;
pub mod selection;
pub mod splitter;
pub mod statistics;

// Direct re-exports for the public API
pub use dependencies::{build_graph, dependency_only, invert};
pub use errors::*;
pub use partition::{group_by_time, group_variable_by_time};
pub use resample::{resample_by_time, resample_dataset};
pub use selection::select_variables;

// High-level convenience API
pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::attributes::{AttrValue, Attributes};
    pub use crate::calendar::{Calendar, CalendarDateTime, TimeAxis};
    pub use crate::config::SplitConfig;
    pub use crate::dataset::{Dataset, TemporalKind, Variable};
    pub use crate::dependencies::{DependencyGraph, DependencyMap, GraphOptions};
    pub use crate::errors::{Result, SplitVarError};
    pub use crate::frequency::Frequency;
    pub use crate::netcdf_io::NetCDFWriter;
    pub use crate::parallel::ParallelConfig;
    pub use crate::statistics::{StatOperation, StatisticalReduction};
}
