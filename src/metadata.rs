//! Chunk naming, metadata enrichment and dependency reports
//!
//! Every chunk written by the splitter carries its temporal and geographic
//! coverage as global attributes and is named after the variable, the
//! simulation and the first and last time steps it holds.

use crate::attributes::{text_attr, AttrValue};
use crate::dataset::Dataset;
use crate::dependencies::DependencyMap;
use crate::errors::{Result, SplitVarError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Units identifying latitude coordinates
pub const LATITUDE_UNITS: [&str; 2] = ["degrees_N", "degrees_north"];
/// Units identifying longitude coordinates
pub const LONGITUDE_UNITS: [&str; 2] = ["degrees_E", "degrees_east"];

/// Replace characters used as separators in output paths
pub fn sanitise(name: &str) -> String {
    name.replace('_', "-")
}

/// Coordinates whose `attribute` contains any of `needles`
pub fn find_matching_vars<S: AsRef<str>>(
    dataset: &Dataset,
    attribute: &str,
    needles: &[S],
    ignore_case: bool,
) -> Vec<String> {
    let fold = |s: &str| if ignore_case { s.to_lowercase() } else { s.to_string() };
    dataset
        .coordinate_names()
        .filter_map(|name| dataset.variable(name))
        .filter(|var| {
            text_attr(var.attrs(), attribute).is_some_and(|value| {
                let value = fold(value);
                needles.iter().any(|needle| value.contains(&fold(needle.as_ref())))
            })
        })
        .map(|var| var.name().to_string())
        .collect()
}

/// Directory receiving the chunks of one variable
pub fn output_dir(base: &Path, simname: &str, model_type: &str, var_name: &str) -> PathBuf {
    [simname, model_type, &sanitise(var_name)]
        .iter()
        .filter(|part| !part.is_empty())
        .fold(base.to_path_buf(), |path, part| path.join(part))
}

/// `{var}_{simname}_{start}_{end}.nc`
pub fn chunk_file_name(var_name: &str, simname: &str, start: &str, end: &str) -> String {
    format!("{}_{simname}_{start}_{end}.nc", sanitise(var_name))
}

/// Formatted first and last time of a chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    pub start: String,
    pub end: String,
}

/// Decorate a chunk with its coverage and remove `delete` attributes.
///
/// Times are formatted in the chunk's own calendar with `time_format`.
pub fn annotate_chunk<S: AsRef<str>>(chunk: &mut Dataset, time_format: &str, delete: &[S]) -> Result<Coverage> {
    let axis = chunk.time_axis()?;
    let (Some(first), Some(last)) = (axis.values.first(), axis.values.last()) else {
        return Err(SplitVarError::NoTimeCoordinate);
    };
    let coverage = Coverage {
        start: first.format(time_format)?,
        end: last.format(time_format)?,
    };
    chunk.set_attribute("time_coverage_start", coverage.start.as_str());
    chunk.set_attribute("time_coverage_end", coverage.end.as_str());

    for (axis_name, units) in [("lat", LATITUDE_UNITS), ("lon", LONGITUDE_UNITS)] {
        let names = find_matching_vars(chunk, "units", &units, false);
        if let Some((min, max)) = value_range(chunk, &names) {
            chunk.set_attribute(&format!("geospatial_{axis_name}_min"), AttrValue::Float(min));
            chunk.set_attribute(&format!("geospatial_{axis_name}_max"), AttrValue::Float(max));
        }
    }

    for name in delete {
        chunk.remove_attribute(name.as_ref());
    }
    Ok(coverage)
}

fn value_range(dataset: &Dataset, names: &[String]) -> Option<(f64, f64)> {
    names
        .iter()
        .filter_map(|name| dataset.variable(name))
        .flat_map(|var| var.data().iter().copied())
        .filter(|v| !v.is_nan())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Prints each data variable with the variables it needs
pub fn print_dependency_report(map: &DependencyMap, inverse: &BTreeMap<String, Vec<String>>) {
    println!("\n Variable dependencies");
    println!("=========================");
    if map.is_empty() {
        println!("   (No data variables found)");
    }
    for (name, deps) in map {
        if deps.is_empty() {
            println!("    {name}: (none)");
        } else {
            let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
            println!("    {name}: {}", deps.join(", "));
        }
    }

    println!("\n Needed by");
    println!("=============");
    if inverse.is_empty() {
        println!("   (No shared dependencies)");
    }
    for (name, sources) in inverse {
        println!("    {name} <- {}", sources.join(", "));
    }
}

/// Dependency map and its inverse as JSON
pub fn dependency_report_json(map: &DependencyMap, inverse: &BTreeMap<String, Vec<String>>) -> Value {
    json!({
        "dependencies": map,
        "dependents": inverse,
    })
}
