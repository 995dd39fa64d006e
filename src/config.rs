//! Run configuration for a split
//!
//! [`SplitConfig`] holds parsed and validated settings; the command line
//! builds one from its arguments and library users can build one directly.

use crate::calendar::validate_time_format;
use crate::dependencies::DEFAULT_SKIP_ATTRIBUTES;
use crate::errors::{Result, SplitVarError};
use crate::frequency::{Frequency, PeriodUnit};
use crate::statistics::StatOperation;
use std::path::PathBuf;

/// Variables never exported on their own
pub const DEFAULT_SKIP_VARIABLES: [&str; 1] = ["time"];
/// Global attributes removed from every chunk
pub const DEFAULT_DELETE_ATTRIBUTES: [&str; 1] = ["filename"];
/// Default output file name date format
pub const DEFAULT_TIME_FORMAT: &str = "%Y%m";

/// Settings for one split run
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub inputs: Vec<PathBuf>,
    /// Period of each output file
    pub frequency: Frequency,
    /// Only export these variables
    pub variables: Option<Vec<String>>,
    /// Variables dropped when the inputs are opened
    pub exclude: Vec<String>,
    /// Variables not exported on their own
    pub skip: Vec<String>,
    pub delete_attributes: Vec<String>,
    /// Files whose variables are merged into the inputs
    pub add: Vec<PathBuf>,
    pub title: Option<String>,
    pub simname: Option<String>,
    pub model_type: String,
    pub time_format: String,
    pub output_dir: PathBuf,
    /// Resample to this frequency before splitting
    pub aggregate: Option<Frequency>,
    /// Statistic for ordinary fields when resampling
    pub reducer: StatOperation,
    pub time_dim: Option<String>,
    /// Write the time dimension as unlimited
    pub unlimited: bool,
    /// Attributes never scanned for variable references
    pub skip_attributes: Vec<String>,
    pub case_insensitive_refs: bool,
}

impl SplitConfig {
    /// Configuration with the default settings for `inputs`
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            frequency: Frequency::new(1, PeriodUnit::YearStart),
            variables: None,
            exclude: Vec::new(),
            skip: DEFAULT_SKIP_VARIABLES.iter().map(|s| s.to_string()).collect(),
            delete_attributes: DEFAULT_DELETE_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            add: Vec::new(),
            title: None,
            simname: None,
            model_type: String::new(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            output_dir: PathBuf::from("."),
            aggregate: None,
            reducer: StatOperation::Mean,
            time_dim: None,
            unlimited: false,
            skip_attributes: DEFAULT_SKIP_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            case_insensitive_refs: false,
        }
    }

    #[must_use]
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = Some(variables);
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_simname(mut self, simname: &str) -> Self {
        self.simname = Some(simname.to_string());
        self
    }

    #[must_use]
    pub fn with_aggregate(mut self, frequency: Frequency, reducer: StatOperation) -> Self {
        self.aggregate = Some(frequency);
        self.reducer = reducer;
        self
    }

    /// Check settings that can only be verified as a whole
    pub fn validate(&self) -> Result<()> {
        validate_time_format(&self.time_format)?;
        if self.inputs.is_empty() {
            return Err(SplitVarError::NoInputFiles);
        }
        Ok(())
    }
}
