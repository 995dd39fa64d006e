//! NetCDF I/O: reading source files into a [`Dataset`] and writing chunks
//!
//! Values are held as `f64` in memory with missing values as NaN. The source
//! storage type and `_FillValue` are kept in each variable's [`Encoding`] and
//! restored when the chunk is written, so integer-packed fields stay packed.

use crate::attributes::{text_attr, AttrValue, Attributes};
use crate::dataset::{Dataset, Encoding, StorageType, Variable};
use crate::errors::{Result, SplitVarError};
use chrono::Utc;
use log::{debug, info, warn};
use ndarray::{ArrayD, IxDyn};
use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::{create, FileMut};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::ops::Range;
use std::{fs, path::Path};

const FILL_ATTRIBUTES: [&str; 2] = ["_FillValue", "missing_value"];

impl StorageType {
    /// Storage for a numeric netCDF type; `None` for strings and user types
    fn from_nc_type(vartype: &NcVariableType) -> Option<Self> {
        let storage = match vartype {
            NcVariableType::Int(IntType::I8) => Self::Byte,
            NcVariableType::Int(IntType::U8) => Self::UByte,
            NcVariableType::Int(IntType::I16) => Self::Short,
            NcVariableType::Int(IntType::U16) => Self::UShort,
            NcVariableType::Int(IntType::I32) => Self::Int,
            NcVariableType::Int(IntType::U32) => Self::UInt,
            NcVariableType::Int(IntType::I64) => Self::Int64,
            NcVariableType::Int(IntType::U64) => Self::UInt64,
            NcVariableType::Float(FloatType::F32) => Self::Float,
            NcVariableType::Float(FloatType::F64) => Self::Double,
            _ => return None,
        };
        Some(storage)
    }
}

/// Read every variable of one file, skipping `exclude`
pub fn read_file(path: &Path, exclude: &[String]) -> Result<Dataset> {
    let file = netcdf::open(path)?;
    info!("Opened {}", path.display());

    let mut ds = Dataset::new();
    for attr in file.attributes() {
        ds.set_attribute(attr.name(), AttrValue::from_netcdf(attr.value()?));
    }

    let mut coordinates = BTreeSet::new();
    let mut variables = Vec::new();
    for var in file.variables() {
        let name = var.name();
        if exclude.iter().any(|x| *x == name) {
            debug!("Excluding {name} from {}", path.display());
            continue;
        }

        let vartype = var.vartype();
        let Some(storage) = StorageType::from_nc_type(&vartype) else {
            warn!("Skipping variable '{name}' with non-numeric type {vartype:?}");
            continue;
        };

        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        let mut attrs = Attributes::new();
        for attr in var.attributes() {
            attrs.insert(attr.name().to_string(), AttrValue::from_netcdf(attr.value()?));
        }
        let fill_value = FILL_ATTRIBUTES
            .iter()
            .find_map(|key| attrs.get(*key).and_then(AttrValue::as_f64));
        attrs.remove("_FillValue");

        let mut values: Vec<f64> = var.get_values::<f64, _>(..)?;
        if let Some(fill) = fill_value {
            for v in values.iter_mut().filter(|v| **v == fill) {
                *v = f64::NAN;
            }
        }
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values)?;

        let chunk_sizes = match var.chunking() {
            Ok(sizes) => sizes,
            Err(err) => {
                debug!("No chunking information for {name}: {err}");
                None
            }
        };

        if dims.len() == 1 && dims[0] == name {
            coordinates.insert(name.clone());
        }
        if let Some(listed) = text_attr(&attrs, "coordinates") {
            coordinates.extend(listed.split_whitespace().map(str::to_string));
        }

        let variable = Variable::from_parts(&name, dims, data)?
            .with_attributes(attrs)
            .with_encoding(Encoding {
                storage,
                fill_value,
                chunk_sizes,
            });
        variables.push(variable);
    }

    for var in variables {
        if coordinates.contains(var.name()) {
            ds.add_coordinate(var)?;
        } else {
            ds.add_variable(var)?;
        }
    }
    Ok(ds)
}

/// Open one or more files as a single dataset.
///
/// Files are read in parallel, ordered by their first time value and joined
/// along the time dimension. Variables named in `exclude` are never read.
/// Temporal kinds are inferred once everything is joined.
pub fn open_dataset<P: AsRef<Path> + Sync>(
    paths: &[P],
    time_dim: Option<&str>,
    exclude: &[String],
) -> Result<Dataset> {
    let mut parts = paths
        .par_iter()
        .map(|path| read_file(path.as_ref(), exclude))
        .collect::<Result<Vec<_>>>()?;

    if let Some(dim) = time_dim {
        parts = parts.into_iter().map(|ds| ds.with_time_dim(dim)).collect();
    }

    let dataset = if parts.len() > 1 {
        let dim = parts[0]
            .time_dim()
            .map(str::to_string)
            .ok_or(SplitVarError::NoTimeCoordinate)?;
        check_time_units(&parts, &dim)?;
        parts.sort_by(|a, b| first_time(a, &dim).total_cmp(&first_time(b, &dim)));
        info!("Concatenating {} files along '{dim}'", parts.len());
        Dataset::concat_along(parts, &dim)?
    } else {
        parts.pop().unwrap_or_default()
    };

    Ok(dataset.infer_temporal_kinds())
}

fn first_time(ds: &Dataset, dim: &str) -> f64 {
    ds.variable(dim)
        .and_then(|v| v.data().iter().next().copied())
        .unwrap_or(f64::INFINITY)
}

fn check_time_units(parts: &[Dataset], dim: &str) -> Result<()> {
    let units = |ds: &Dataset| {
        ds.variable(dim)
            .and_then(|v| text_attr(v.attrs(), "units"))
            .unwrap_or_default()
            .to_string()
    };
    let first = units(&parts[0]);
    for part in &parts[1..] {
        let other = units(part);
        if other != first {
            return Err(SplitVarError::InconsistentTimeUnits { first, other });
        }
    }
    Ok(())
}

/// Writes datasets to netCDF files
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
    unlimited: Option<&'a str>,
}

impl<'a> NetCDFWriter<'a> {
    /// Create a new NetCDF writer
    pub fn new(output_path: &'a Path) -> Self {
        Self {
            output_path,
            unlimited: None,
        }
    }

    /// Write `dim` as an unlimited dimension
    #[must_use]
    pub fn with_unlimited(mut self, dim: Option<&'a str>) -> Self {
        self.unlimited = dim;
        self
    }

    /// Write every variable and global attribute of `dataset`
    pub fn write_dataset(&self, dataset: &Dataset) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }

        let mut file = create(self.output_path)?;

        for (dim_name, dim_len) in dataset.dimensions() {
            if self.unlimited == Some(dim_name.as_str()) {
                file.add_unlimited_dimension(&dim_name)?;
            } else {
                file.add_dimension(&dim_name, dim_len)?;
            }
        }

        for var in dataset.variables() {
            self.write_variable(&mut file, var)?;
        }

        for (name, value) in dataset.attrs() {
            if name == "history" {
                continue;
            }
            file.add_attribute(name, value.to_netcdf())?;
        }

        // Add history attribute
        let entry = format!("{}: Created by splitvar", Utc::now().to_rfc3339());
        let history = match text_attr(dataset.attrs(), "history") {
            Some(previous) => format!("{entry}\n{previous}"),
            None => entry,
        };
        file.add_attribute("history", history)?;

        info!("Wrote {}", self.output_path.display());
        Ok(())
    }

    fn write_variable(&self, file: &mut FileMut, var: &Variable) -> Result<()> {
        let dim_refs: Vec<&str> = var.dims().iter().map(String::as_str).collect();
        let encoding = var.encoding();
        let fill = encoding.fill_value;
        let data = var.data();

        macro_rules! write_as {
            ($t:ty) => {{
                let mut nc_var = file.add_variable::<$t>(var.name(), &dim_refs)?;
                if let Some(fv) = fill {
                    nc_var.put_attribute("_FillValue", fv as $t)?;
                }
                if let Some(sizes) = &encoding.chunk_sizes {
                    if sizes.len() == var.shape().len() && !var.shape().is_empty() {
                        let clamped: Vec<usize> = sizes
                            .iter()
                            .zip(var.shape())
                            .map(|(&size, &len)| size.min(len).max(1))
                            .collect();
                        nc_var.set_chunking(&clamped)?;
                    }
                }
                let encoded = data.mapv(|v| if v.is_nan() { fill.unwrap_or(v) as $t } else { v as $t });
                let extents = self.extents(var)?;
                match extents.as_deref() {
                    None => nc_var.put(encoded.view(), ..)?,
                    Some([a]) => nc_var.put(encoded.view(), a.clone())?,
                    Some([a, b]) => nc_var.put(encoded.view(), (a.clone(), b.clone()))?,
                    Some([a, b, c]) => nc_var.put(encoded.view(), (a.clone(), b.clone(), c.clone()))?,
                    Some([a, b, c, d]) => {
                        nc_var.put(encoded.view(), (a.clone(), b.clone(), c.clone(), d.clone()))?
                    }
                    Some(_) => {
                        return Err(SplitVarError::UnsupportedRank {
                            var: var.name().to_string(),
                            rank: var.shape().len(),
                        })
                    }
                }
                for (name, value) in var.attrs() {
                    nc_var.put_attribute(name, value.to_netcdf())?;
                }
            }};
        }

        match encoding.storage {
            StorageType::Byte => write_as!(i8),
            StorageType::UByte => write_as!(u8),
            StorageType::Short => write_as!(i16),
            StorageType::UShort => write_as!(u16),
            StorageType::Int => write_as!(i32),
            StorageType::UInt => write_as!(u32),
            StorageType::Int64 => write_as!(i64),
            StorageType::UInt64 => write_as!(u64),
            StorageType::Float => write_as!(f32),
            StorageType::Double => write_as!(f64),
        }
        Ok(())
    }

    /// Explicit ranges when the variable grows along the unlimited dimension
    fn extents(&self, var: &Variable) -> Result<Option<Vec<Range<usize>>>> {
        let grows = self
            .unlimited
            .is_some_and(|dim| var.axis_of(dim).is_some());
        if !grows {
            return Ok(None);
        }
        if var.shape().len() > 4 {
            return Err(SplitVarError::UnsupportedRank {
                var: var.name().to_string(),
                rank: var.shape().len(),
            });
        }
        Ok(Some(var.shape().iter().map(|&len| 0..len).collect()))
    }
}

/// Write `dataset` to `path`, optionally with an unlimited dimension
pub fn write_dataset(dataset: &Dataset, path: &Path, unlimited: Option<&str>) -> Result<()> {
    NetCDFWriter::new(path)
        .with_unlimited(unlimited)
        .write_dataset(dataset)
}
