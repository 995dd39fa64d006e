//! In-memory dataset model
//!
//! A [`Dataset`] is an owned collection of named [`Variable`]s plus global
//! attributes. Stages of a split take a dataset by reference and return new
//! datasets; nothing is shared or mutated behind the caller's back, so the
//! chunks written for one variable never alias each other.

use crate::attributes::{text_attr, AttrValue, Attributes};
use crate::calendar::{TimeAxis, TimeUnit};
use crate::errors::{Result, SplitVarError};
use log::debug;
use ndarray::{concatenate, ArrayD, ArrayViewD, Axis, Slice};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// How a variable's values relate to time, decided once when a dataset is
/// opened and used to pick the reduction applied when resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalKind {
    /// Points in time, including time bounds
    Instant,
    /// Time spans such as averaging intervals
    Duration,
    /// Ordinary physical fields
    #[default]
    Plain,
}

impl TemporalKind {
    /// Classify a variable from its `units` attribute
    #[must_use]
    pub fn from_attributes(attrs: &Attributes) -> Self {
        match text_attr(attrs, "units") {
            Some(units) if units.contains(" since ") => Self::Instant,
            Some(units) if TimeUnit::parse(units).is_some() => Self::Duration,
            _ => Self::Plain,
        }
    }
}

/// On-disk storage type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    /// `byte` (i8)
    Byte,
    /// `ubyte` (u8)
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Int64,
    UInt64,
    Float,
    #[default]
    Double,
}

/// Encoding details carried from the source file to the written chunks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Encoding {
    pub storage: StorageType,
    /// Value written in place of NaN
    pub fill_value: Option<f64>,
    pub chunk_sizes: Option<Vec<usize>>,
}

/// A named, dimensioned array with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    dims: Vec<String>,
    data: ArrayD<f64>,
    attrs: Attributes,
    encoding: Encoding,
    kind: TemporalKind,
}

impl Variable {
    /// Create a variable, checking that every axis is named
    pub fn new(name: &str, dims: &[&str], data: ArrayD<f64>) -> Result<Self> {
        Self::from_parts(name, dims.iter().map(|d| d.to_string()).collect(), data)
    }

    pub(crate) fn from_parts(name: &str, dims: Vec<String>, data: ArrayD<f64>) -> Result<Self> {
        if dims.len() != data.ndim() {
            return Err(SplitVarError::DimensionMismatch {
                var: name.to_string(),
                dim: dims.join(","),
                expected: dims.len(),
                found: data.ndim(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            dims,
            data,
            attrs: Attributes::new(),
            encoding: Encoding::default(),
            kind: TemporalKind::Plain,
        })
    }

    #[must_use]
    pub fn with_attributes(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: TemporalKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    pub fn kind(&self) -> TemporalKind {
        self.kind
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Position of `dim` among this variable's axes
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// Length along `dim`, if the variable has that dimension
    pub fn dim_len(&self, dim: &str) -> Option<usize> {
        self.axis_of(dim).map(|axis| self.data.len_of(Axis(axis)))
    }

    /// Copy of this variable restricted to `range` along `dim`.
    ///
    /// Variables without `dim` are returned whole.
    #[must_use]
    pub fn slice_along(&self, dim: &str, range: Range<usize>) -> Self {
        match self.axis_of(dim) {
            Some(axis) => {
                let data = self
                    .data
                    .slice_axis(Axis(axis), Slice::from(range))
                    .to_owned();
                Self {
                    data,
                    ..self.clone()
                }
            }
            None => self.clone(),
        }
    }

    /// Replace the values while keeping name, dimensions and metadata
    pub(crate) fn with_data(&self, data: ArrayD<f64>) -> Result<Self> {
        Ok(Self::from_parts(&self.name, self.dims.clone(), data)?
            .with_attributes(self.attrs.clone())
            .with_encoding(self.encoding.clone())
            .with_kind(self.kind))
    }

    fn values_1d(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }
}

/// A collection of variables sharing dimensions, plus global attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    variables: BTreeMap<String, Variable>,
    coordinates: BTreeSet<String>,
    attrs: Attributes,
    time_dim: Option<String>,
}

impl Dataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the time dimension explicitly instead of detecting it
    #[must_use]
    pub fn with_time_dim(mut self, dim: &str) -> Self {
        self.time_dim = Some(dim.to_string());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    /// Add a data variable
    pub fn add_variable(&mut self, var: Variable) -> Result<()> {
        self.check_dimensions(&var)?;
        self.coordinates.remove(var.name());
        self.variables.insert(var.name().to_string(), var);
        Ok(())
    }

    /// Add a coordinate variable
    pub fn add_coordinate(&mut self, var: Variable) -> Result<()> {
        self.check_dimensions(&var)?;
        self.coordinates.insert(var.name().to_string());
        self.variables.insert(var.name().to_string(), var);
        Ok(())
    }

    /// Builder form of [`Dataset::add_variable`]
    pub fn variable_added(mut self, var: Variable) -> Result<Self> {
        self.add_variable(var)?;
        Ok(self)
    }

    /// Builder form of [`Dataset::add_coordinate`]
    pub fn coordinate_added(mut self, var: Variable) -> Result<Self> {
        self.add_coordinate(var)?;
        Ok(self)
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn is_coordinate(&self, name: &str) -> bool {
        self.coordinates.contains(name)
    }

    /// Names of the coordinate variables
    pub fn coordinate_names(&self) -> impl Iterator<Item = &str> {
        self.coordinates.iter().map(String::as_str)
    }

    /// Names of the data (non-coordinate) variables
    pub fn data_var_names(&self) -> impl Iterator<Item = &str> {
        self.variables
            .keys()
            .filter(|name| !self.coordinates.contains(*name))
            .map(String::as_str)
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<AttrValue> {
        self.attrs.remove(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Dimension lengths used by the variables
    pub fn dimensions(&self) -> BTreeMap<String, usize> {
        let mut dims = BTreeMap::new();
        for var in self.variables.values() {
            for (dim, &len) in var.dims().iter().zip(var.shape()) {
                dims.entry(dim.clone()).or_insert(len);
            }
        }
        dims
    }

    fn check_dimensions(&self, var: &Variable) -> Result<()> {
        let known = self.dimensions();
        for (dim, &found) in var.dims().iter().zip(var.shape()) {
            if let Some(&expected) = known.get(dim) {
                // A replaced variable may legitimately change its own dimension
                let only_user = self
                    .variables
                    .values()
                    .all(|v| v.name() == var.name() || v.axis_of(dim).is_none());
                if expected != found && !only_user {
                    return Err(SplitVarError::DimensionMismatch {
                        var: var.name().to_string(),
                        dim: dim.clone(),
                        expected,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    /// Name of the time dimension.
    ///
    /// An explicit name wins; otherwise the first dimension whose coordinate
    /// variable has `<unit> since <date>` units.
    pub fn time_dim(&self) -> Option<&str> {
        if let Some(dim) = &self.time_dim {
            return Some(dim);
        }
        self.variables
            .values()
            .find(|var| {
                var.dims().len() == 1
                    && var.dims()[0] == var.name()
                    && text_attr(var.attrs(), "units").is_some_and(|u| u.contains(" since "))
            })
            .map(Variable::name)
    }

    /// Decode the time coordinate
    pub fn time_axis(&self) -> Result<TimeAxis> {
        let dim = self.time_dim().ok_or(SplitVarError::NoTimeCoordinate)?;
        let var = self
            .variables
            .get(dim)
            .ok_or(SplitVarError::NoTimeCoordinate)?;
        TimeAxis::decode(dim, &var.values_1d(), var.attrs())
    }

    /// New dataset holding only `names`, with global attributes and the time
    /// dimension carried over. Nothing else is attached.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let mut variables = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            let var = self
                .variables
                .get(name)
                .ok_or_else(|| SplitVarError::VariableNotFound {
                    var: name.to_string(),
                })?;
            variables.insert(name.to_string(), var.clone());
        }
        let coordinates = self
            .coordinates
            .iter()
            .filter(|c| variables.contains_key(*c))
            .cloned()
            .collect();
        Ok(Self {
            variables,
            coordinates,
            attrs: self.attrs.clone(),
            time_dim: self.time_dim.clone(),
        })
    }

    /// Copy of this dataset restricted to `range` along `dim`
    #[must_use]
    pub fn slice_along(&self, dim: &str, range: Range<usize>) -> Self {
        let variables = self
            .variables
            .iter()
            .map(|(name, var)| (name.clone(), var.slice_along(dim, range.clone())))
            .collect();
        Self {
            variables,
            ..self.clone_metadata()
        }
    }

    /// Same metadata, no variables
    pub(crate) fn clone_metadata(&self) -> Self {
        Self {
            variables: BTreeMap::new(),
            coordinates: self.coordinates.clone(),
            attrs: self.attrs.clone(),
            time_dim: self.time_dim.clone(),
        }
    }

    /// Combine two datasets.
    ///
    /// Variables and global attributes of `self` take precedence over those of
    /// `overlay` with the same name; dimension lengths must agree.
    pub fn merge(&self, overlay: &Dataset) -> Result<Self> {
        let mut merged = self.clone();
        for (name, var) in &overlay.variables {
            if merged.variables.contains_key(name) {
                debug!("Keeping existing '{name}' over overlay variable");
                continue;
            }
            if overlay.coordinates.contains(name) {
                merged.add_coordinate(var.clone())?;
            } else {
                merged.add_variable(var.clone())?;
            }
        }
        for (name, value) in &overlay.attrs {
            merged
                .attrs
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        if merged.time_dim.is_none() {
            merged.time_dim = overlay.time_dim.clone();
        }
        Ok(merged)
    }

    /// Join datasets end to end along `dim`.
    ///
    /// Variables with `dim` are concatenated in order; the others are taken
    /// from the first dataset.
    pub fn concat_along(parts: Vec<Dataset>, dim: &str) -> Result<Self> {
        let mut parts = parts.into_iter();
        let Some(first) = parts.next() else {
            return Ok(Self::new());
        };
        let rest: Vec<Dataset> = parts.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        let mut joined = first.clone_metadata();
        for (name, var) in &first.variables {
            let Some(axis) = var.axis_of(dim) else {
                joined.variables.insert(name.clone(), var.clone());
                continue;
            };
            let mut views: Vec<ArrayViewD<'_, f64>> = vec![var.data().view()];
            for part in &rest {
                let other = part
                    .variables
                    .get(name)
                    .ok_or_else(|| SplitVarError::VariableNotFound { var: name.clone() })?;
                views.push(other.data().view());
            }
            let data = concatenate(Axis(axis), &views)?;
            joined.variables.insert(name.clone(), var.with_data(data)?);
        }
        Ok(joined)
    }

    /// Decide each variable's [`TemporalKind`] from its metadata.
    ///
    /// Variables with `<unit> since <date>` units are instants, and so are the
    /// variables their `bounds` attribute names; bare time units mark
    /// durations.
    #[must_use]
    pub fn infer_temporal_kinds(mut self) -> Self {
        let bounds: BTreeSet<String> = self
            .variables
            .values()
            .filter(|v| TemporalKind::from_attributes(v.attrs()) == TemporalKind::Instant)
            .filter_map(|v| text_attr(v.attrs(), "bounds").map(str::to_string))
            .collect();
        for (name, var) in self.variables.iter_mut() {
            var.kind = if bounds.contains(name) {
                TemporalKind::Instant
            } else {
                TemporalKind::from_attributes(var.attrs())
            };
        }
        self
    }
}
