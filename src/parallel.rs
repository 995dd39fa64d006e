//! Parallel processing configuration and management
//!
//! This module configures Rayon's global thread pool, which serves both the
//! parallel file reads at open time and the lane-parallel reductions used
//! when resampling.

use crate::errors::{Result, SplitVarError};
use log::{debug, info};
use rayon::ThreadPoolBuilder;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Set up the global Rayon thread pool with the specified configuration
    pub fn setup_global_pool(&self) -> Result<()> {
        if let Some(num_threads) = self.num_threads {
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| {
                    SplitVarError::ThreadPoolError(format!(
                        "Failed to initialize thread pool with {num_threads} threads: {e}"
                    ))
                })?;

            info!("Configured parallel processing with {num_threads} threads");
        } else {
            debug!("Using default thread pool configuration");
        }

        Ok(())
    }

    /// Get the current number of threads being used
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }

    /// Create a configuration that uses all available CPU cores
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    /// Create a configuration that uses a specific number of threads
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }
}

/// Get information about the current parallel configuration
pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
    }
}

/// Information about the parallel processing environment
#[derive(Debug, Clone)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
}

impl ParallelInfo {
    /// Log parallel processing information
    pub fn log_info(&self) {
        debug!(
            "Parallel processing: {} threads, {} CPU cores available",
            self.current_threads, self.available_cores
        );
    }
}
