//! Variable dependency graph
//!
//! A variable depends on another when one of its text attributes names it
//! (for example `coordinates = "lat lon"`, `bounds = "time_bnds"` or
//! `cell_measures = "area: area_t"`), or when it is dimensioned by a
//! coordinate variable. Names match as whole words only, so `du/dt` does not
//! reference `u`.
//!
//! Resolution walks the graph breadth first with a visited set, which keeps
//! cyclic references (a coordinate whose `bounds` refers back to it, say)
//! finite.

use crate::attributes::AttrValue;
use crate::dataset::{Dataset, Variable};
use crate::errors::Result;
use log::debug;
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Attributes whose free text describes a variable rather than referencing
/// others
pub const DEFAULT_SKIP_ATTRIBUTES: [&str; 4] = ["long_name", "standard_name", "name", "description"];

/// Variable name to the names it transitively depends on
pub type DependencyMap = BTreeMap<String, BTreeSet<String>>;

/// Options controlling reference detection
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Attributes that are never scanned for references
    pub skip_attributes: Vec<String>,
    /// Match variable names regardless of case
    pub case_insensitive: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            skip_attributes: DEFAULT_SKIP_ATTRIBUTES.iter().map(|s| s.to_string()).collect(),
            case_insensitive: false,
        }
    }
}

impl GraphOptions {
    /// Options skipping `skip` instead of the default attribute list
    pub fn skipping<S: AsRef<str>>(skip: &[S]) -> Self {
        Self {
            skip_attributes: skip.iter().map(|s| s.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }
}

/// Direct references between the variables of one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Scan every variable of `dataset` for references
    pub fn build_with(dataset: &Dataset, options: &GraphOptions) -> Result<Self> {
        let mut edges = BTreeMap::new();
        let Some(pattern) = name_pattern(dataset, options.case_insensitive)? else {
            return Ok(Self { edges });
        };

        // Canonical spelling of each name for case-insensitive matches
        let canonical: BTreeMap<String, &str> = dataset
            .variable_names()
            .map(|name| {
                let key = if options.case_insensitive {
                    name.to_lowercase()
                } else {
                    name.to_string()
                };
                (key, name)
            })
            .collect();

        for var in dataset.variables() {
            let mut targets = BTreeSet::new();
            for (attr, value) in var.attrs() {
                if options.skip_attributes.iter().any(|s| s == attr) {
                    continue;
                }
                let texts = match value {
                    AttrValue::Text(_) | AttrValue::TextList(_) => value.texts(),
                    AttrValue::Int(_) | AttrValue::Float(_) | AttrValue::IntList(_) | AttrValue::FloatList(_) => {
                        continue
                    }
                };
                for text in texts {
                    for found in pattern.find_iter(text) {
                        let key = if options.case_insensitive {
                            found.as_str().to_lowercase()
                        } else {
                            found.as_str().to_string()
                        };
                        if let Some(&target) = canonical.get(&key) {
                            targets.insert(target.to_string());
                        }
                    }
                }
            }
            targets.extend(dimension_references(dataset, var));
            targets.remove(var.name());
            if !targets.is_empty() {
                debug!("{} references {:?}", var.name(), targets);
            }
            edges.insert(var.name().to_string(), targets);
        }
        Ok(Self { edges })
    }

    /// Variables referenced directly by `name`
    pub fn successors(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(name)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// Every variable reachable from `name`, excluding `name` itself
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<&str> = self.successors(name).collect();
        while let Some(next) = queue.pop_front() {
            if next == name || !visited.insert(next.to_string()) {
                continue;
            }
            queue.extend(self.successors(next));
        }
        visited
    }

    /// Transitive dependencies of every data variable in `dataset`
    pub fn resolve(&self, dataset: &Dataset) -> DependencyMap {
        dataset
            .data_var_names()
            .map(|name| (name.to_string(), self.transitive_dependencies(name)))
            .collect()
    }
}

fn dimension_references<'a>(dataset: &'a Dataset, var: &'a Variable) -> impl Iterator<Item = String> + 'a {
    var.dims()
        .iter()
        .filter(move |dim| dataset.contains(dim))
        .cloned()
}

/// Whole-word pattern matching any variable name, or `None` for an empty
/// dataset
fn name_pattern(dataset: &Dataset, case_insensitive: bool) -> Result<Option<Regex>> {
    let mut names: Vec<&str> = dataset.variable_names().collect();
    if names.is_empty() {
        return Ok(None);
    }
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let alternatives: Vec<String> = names.iter().map(|name| regex::escape(name)).collect();
    let pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", alternatives.join("|")))
        .case_insensitive(case_insensitive)
        .build()?;
    Ok(Some(pattern))
}

/// Transitive dependencies of every data variable, scanning all attributes
/// except `skip`
pub fn build_graph<S: AsRef<str>>(dataset: &Dataset, skip: &[S]) -> Result<DependencyMap> {
    let graph = DependencyGraph::build_with(dataset, &GraphOptions::skipping(skip))?;
    Ok(graph.resolve(dataset))
}

/// For each dependency, the variables that depend on it
pub fn invert(map: &DependencyMap) -> BTreeMap<String, Vec<String>> {
    let mut inverse: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (source, deps) in map {
        for dep in deps {
            let sources = inverse.entry(dep.clone()).or_default();
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
    }
    inverse
}

/// Variables that some other variable depends on
pub fn dependency_only(map: &DependencyMap) -> BTreeSet<String> {
    invert(map).into_keys().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn scalar(name: &str) -> Variable {
        Variable::new(name, &["x"], Array1::zeros(1).into_dyn()).unwrap()
    }

    #[test]
    fn empty_dataset_has_no_edges() {
        let graph = DependencyGraph::build_with(&Dataset::new(), &GraphOptions::default()).unwrap();
        assert_eq!(graph, DependencyGraph::default());
    }

    #[test]
    fn longer_names_win_over_prefixes() {
        let ds = Dataset::new()
            .variable_added(scalar("a").with_attribute("comment", "see time_bnds"))
            .unwrap()
            .variable_added(scalar("time_bnds"))
            .unwrap()
            .variable_added(scalar("time"))
            .unwrap();
        let graph = DependencyGraph::build_with(&ds, &GraphOptions::default()).unwrap();
        let direct: Vec<&str> = graph.successors("a").collect();
        assert_eq!(direct, vec!["time_bnds"]);
    }

    #[test]
    fn case_insensitive_matching_is_opt_in() {
        let ds = Dataset::new()
            .variable_added(scalar("a").with_attribute("comment", "scaled by AREA"))
            .unwrap()
            .variable_added(scalar("area"))
            .unwrap();
        let strict = DependencyGraph::build_with(&ds, &GraphOptions::default()).unwrap();
        assert_eq!(strict.successors("a").count(), 0);

        let loose = DependencyGraph::build_with(&ds, &GraphOptions::default().case_insensitive(true)).unwrap();
        assert_eq!(loose.successors("a").collect::<Vec<_>>(), vec!["area"]);
    }
}
