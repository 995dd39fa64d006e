//! Defines command-line interface options using `clap` for splitvar.

use clap::Parser;
use splitvar::config::{SplitConfig, DEFAULT_DELETE_ATTRIBUTES, DEFAULT_SKIP_VARIABLES, DEFAULT_TIME_FORMAT};
use splitvar::frequency::Frequency;
use splitvar::statistics::StatOperation;
use std::path::PathBuf;

/// Split multiple netCDF files by time and variable
#[derive(Parser, Debug)]
#[command(name = "splitvar", version, about = "Split multiple netCDF files by time and variable")]
pub struct Args {
    /// netCDF files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Time frequency for output, e.g. time.year, 12MS, 5D
    #[arg(short, long, default_value = "time.year", value_parser = parse_frequency)]
    pub frequency: Frequency,

    /// Only extract specified variables
    #[arg(short, long)]
    pub variables: Vec<String>,

    /// Exclude specified variables when reading the inputs
    #[arg(short = 'x', long = "x-variables")]
    pub x_variables: Vec<String>,

    /// Do not extract these variables (in addition to time)
    #[arg(short, long)]
    pub skipvars: Vec<String>,

    /// Delete specified global attributes (in addition to filename)
    #[arg(short, long)]
    pub delattr: Vec<String>,

    /// Read in additional variables from these files
    #[arg(short, long)]
    pub add: Vec<PathBuf>,

    /// Title of the simulation, included in metadata
    #[arg(short, long)]
    pub title: Option<String>,

    /// Simulation name to include in the filename
    #[arg(long)]
    pub simname: Option<String>,

    /// Model type to include in the output path
    #[arg(long = "model-type", default_value = "")]
    pub model_type: String,

    /// strftime format string for date fields in filename
    #[arg(long, default_value = DEFAULT_TIME_FORMAT)]
    pub timeformat: String,

    /// Output directory in which to store the data
    #[arg(short, long, default_value = ".")]
    pub outputdir: PathBuf,

    /// Resample to this frequency before splitting
    #[arg(long, value_parser = parse_frequency)]
    pub aggregate: Option<Frequency>,

    /// Statistic applied to ordinary fields when resampling: mean, sum, min, max
    #[arg(long, default_value = "mean", value_parser = parse_reducer)]
    pub reducer: StatOperation,

    /// Name of the time dimension, detected from the coordinates when omitted
    #[arg(long)]
    pub time_dim: Option<String>,

    /// Write the time dimension as unlimited
    #[arg(long)]
    pub unlimited: bool,

    /// Match variable names in attributes regardless of case
    #[arg(long)]
    pub case_insensitive_refs: bool,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Print the dependencies of every variable and exit
    #[arg(long)]
    pub list_deps: bool,

    /// Write the dependencies of every variable as JSON to this file and exit
    #[arg(long)]
    pub dump_deps: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Settings for the library, with the command line defaults prepended
    pub fn to_config(&self) -> SplitConfig {
        let with_defaults = |defaults: &[&str], extra: &[String]| -> Vec<String> {
            defaults
                .iter()
                .map(|s| s.to_string())
                .chain(extra.iter().cloned())
                .collect()
        };

        let mut config = SplitConfig::new(self.inputs.clone())
            .with_frequency(self.frequency.clone())
            .with_output_dir(self.outputdir.clone());
        if !self.variables.is_empty() {
            config = config.with_variables(self.variables.clone());
        }
        if let Some(aggregate) = &self.aggregate {
            config = config.with_aggregate(aggregate.clone(), self.reducer);
        }
        config.exclude = self.x_variables.clone();
        config.skip = with_defaults(&DEFAULT_SKIP_VARIABLES, &self.skipvars);
        config.delete_attributes = with_defaults(&DEFAULT_DELETE_ATTRIBUTES, &self.delattr);
        config.add = self.add.clone();
        config.title = self.title.clone();
        config.simname = self.simname.clone();
        config.model_type = self.model_type.clone();
        config.time_format = self.timeformat.clone();
        config.time_dim = self.time_dim.clone();
        config.unlimited = self.unlimited;
        config.case_insensitive_refs = self.case_insensitive_refs;
        config
    }
}

fn parse_frequency(s: &str) -> Result<Frequency, String> {
    s.parse().map_err(|e: splitvar::SplitVarError| e.to_string())
}

fn parse_reducer(s: &str) -> Result<StatOperation, String> {
    s.parse().map_err(|e: splitvar::SplitVarError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_kept_when_appending() {
        let args = Args::parse_from(["splitvar", "-s", "area", "-f", "12MS", "a.nc", "b.nc"]);
        let config = args.to_config();
        assert_eq!(config.skip, vec!["time", "area"]);
        assert_eq!(config.frequency.alias(), "12MS");
        assert_eq!(config.inputs.len(), 2);
        assert!(config.variables.is_none());
    }

    #[test]
    fn bad_frequency_is_a_usage_error() {
        assert!(Args::try_parse_from(["splitvar", "-f", "fortnightly", "a.nc"]).is_err());
    }
}
