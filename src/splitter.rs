//! Split orchestration
//!
//! Opens the inputs, resolves dependencies once, and for every selected
//! variable writes one file per time period holding the variable and
//! everything it needs.

use crate::attributes::text_attr;
use crate::config::SplitConfig;
use crate::dataset::Dataset;
use crate::dependencies::{dependency_only, DependencyGraph, DependencyMap, GraphOptions};
use crate::errors::Result;
use crate::metadata::{annotate_chunk, chunk_file_name, output_dir, sanitise};
use crate::netcdf_io::{open_dataset, write_dataset};
use crate::partition::group_by_time;
use crate::resample::resample_dataset;
use crate::selection::select_variables;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Fallback simulation name when neither the inputs nor the caller give one
pub const DEFAULT_SIMNAME: &str = "simname";

/// What a split run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSummary {
    /// Files written, in order
    pub outputs: Vec<PathBuf>,
    /// Number of chunks written per exported variable
    pub chunks: BTreeMap<String, usize>,
}

impl SplitSummary {
    pub fn total_chunks(&self) -> usize {
        self.outputs.len()
    }
}

/// Open the inputs and apply naming and overlay settings
pub fn prepare_dataset(config: &SplitConfig) -> Result<Dataset> {
    config.validate()?;
    let time_dim = config.time_dim.as_deref();
    let mut ds = open_dataset(&config.inputs, time_dim, &config.exclude)?;

    let simname = config
        .simname
        .clone()
        .or_else(|| text_attr(ds.attrs(), "simname").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_SIMNAME.to_string());
    ds.set_attribute("simname", sanitise(&simname));

    let title = config
        .title
        .clone()
        .or_else(|| text_attr(ds.attrs(), "title").map(str::to_string));
    if let Some(title) = title {
        ds.set_attribute("title", sanitise(&title));
    }

    for path in &config.add {
        info!("Adding {}", path.display());
        let overlay = open_dataset(std::slice::from_ref(path), time_dim, &config.exclude)?;
        ds = ds.merge(&overlay)?;
    }
    Ok(ds.infer_temporal_kinds())
}

/// Dependencies of every data variable under the configured scanning options
pub fn dependency_map(ds: &Dataset, config: &SplitConfig) -> Result<DependencyMap> {
    let options = GraphOptions::skipping(&config.skip_attributes).case_insensitive(config.case_insensitive_refs);
    Ok(DependencyGraph::build_with(ds, &options)?.resolve(ds))
}

/// Run a complete split
pub fn split_files(config: &SplitConfig) -> Result<SplitSummary> {
    let ds = prepare_dataset(config)?;
    split_dataset(&ds, config)
}

/// Split an already opened dataset
///
/// A dataset without a time coordinate fails with
/// [`NoTimeCoordinate`](crate::errors::SplitVarError::NoTimeCoordinate)
/// before anything is written.
pub fn split_dataset(ds: &Dataset, config: &SplitConfig) -> Result<SplitSummary> {
    let time_dim = ds.time_axis()?.dim;
    let map = dependency_map(ds, config)?;
    let helpers = dependency_only(&map);
    let simname = text_attr(ds.attrs(), "simname").unwrap_or(DEFAULT_SIMNAME).to_string();

    let mut summary = SplitSummary::default();
    let selection = select_variables(ds, config.variables.as_deref(), &config.skip, &helpers);
    for name in selection {
        info!("Splitting {name} by time");
        let mut members = vec![name.clone()];
        if let Some(deps) = map.get(&name) {
            members.extend(deps.iter().cloned());
        }
        let subset = ds.subset(&members)?;
        let written = split_variable(&subset, &name, &time_dim, &simname, config, &mut summary.outputs)?;
        summary.chunks.insert(name, written);
    }
    Ok(summary)
}

fn split_variable(
    subset: &Dataset,
    name: &str,
    time_dim: &str,
    simname: &str,
    config: &SplitConfig,
    outputs: &mut Vec<PathBuf>,
) -> Result<usize> {
    if subset.variable(name).and_then(|v| v.axis_of(time_dim)).is_none() {
        warn!("{name} does not vary along '{time_dim}', nothing to split");
        return Ok(0);
    }

    let resampled;
    let source = match &config.aggregate {
        Some(frequency) => {
            resampled = resample_dataset(subset, name, frequency, config.reducer)?;
            &resampled
        }
        None => subset,
    };

    let groups = group_by_time(source, &config.frequency)?;
    let dir = output_dir(&config.output_dir, simname, &config.model_type, name);
    fs::create_dir_all(&dir)?;

    let unlimited = config.unlimited.then_some(time_dim);
    let mut written = 0;
    for mut chunk in groups {
        let coverage = annotate_chunk(&mut chunk, &config.time_format, &config.delete_attributes)?;
        let path = dir.join(chunk_file_name(name, simname, &coverage.start, &coverage.end));
        info!("Saving data to {}", path.display());
        write_dataset(&chunk, &path, unlimited)?;
        outputs.push(path);
        written += 1;
    }

    if written == 0 {
        // No data written, remove the empty output directory
        if let Err(err) = fs::remove_dir(&dir) {
            warn!("Could not remove empty directory {}: {err}", dir.display());
        }
    }
    Ok(written)
}
