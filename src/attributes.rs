//! Attribute values attached to datasets and variables
//!
//! NetCDF attributes may hold text, numbers, or homogeneous lists of either.
//! They are modelled as the tagged union [`AttrValue`] so every site that
//! scans or rewrites attributes matches the variants it understands instead of
//! silently ignoring the rest.

use netcdf::AttributeValue;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute mapping, ordered by name for reproducible output
pub type Attributes = BTreeMap<String, AttrValue>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
    TextList(Vec<String>),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
}

impl AttrValue {
    /// Text fragments held by this value, empty for numeric values
    pub fn texts(&self) -> Vec<&str> {
        match self {
            AttrValue::Text(s) => vec![s.as_str()],
            AttrValue::TextList(items) => items.iter().map(String::as_str).collect(),
            AttrValue::Int(_)
            | AttrValue::Float(_)
            | AttrValue::IntList(_)
            | AttrValue::FloatList(_) => Vec::new(),
        }
    }

    /// The value as a single string, if it is scalar text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a single number, if it is a numeric scalar
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert a value read through the netcdf crate.
    ///
    /// Every integer width widens to `Int` and both float widths to `Float`.
    pub fn from_netcdf(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Str(s) => AttrValue::Text(s),
            AttributeValue::Strs(ss) => AttrValue::TextList(ss),
            AttributeValue::Float(f) => AttrValue::Float(f64::from(f)),
            AttributeValue::Floats(fs) => AttrValue::FloatList(fs.into_iter().map(f64::from).collect()),
            AttributeValue::Double(d) => AttrValue::Float(d),
            AttributeValue::Doubles(ds) => AttrValue::FloatList(ds),
            AttributeValue::Uchar(u) => AttrValue::Int(i64::from(u)),
            AttributeValue::Uchars(us) => AttrValue::IntList(us.into_iter().map(i64::from).collect()),
            AttributeValue::Schar(s) => AttrValue::Int(i64::from(s)),
            AttributeValue::Schars(ss) => AttrValue::IntList(ss.into_iter().map(i64::from).collect()),
            AttributeValue::Short(s) => AttrValue::Int(i64::from(s)),
            AttributeValue::Shorts(ss) => AttrValue::IntList(ss.into_iter().map(i64::from).collect()),
            AttributeValue::Ushort(u) => AttrValue::Int(i64::from(u)),
            AttributeValue::Ushorts(us) => AttrValue::IntList(us.into_iter().map(i64::from).collect()),
            AttributeValue::Int(i) => AttrValue::Int(i64::from(i)),
            AttributeValue::Ints(is) => AttrValue::IntList(is.into_iter().map(i64::from).collect()),
            AttributeValue::Uint(u) => AttrValue::Int(i64::from(u)),
            AttributeValue::Uints(us) => AttrValue::IntList(us.into_iter().map(i64::from).collect()),
            AttributeValue::Longlong(l) => AttrValue::Int(l),
            AttributeValue::Longlongs(ls) => AttrValue::IntList(ls),
            AttributeValue::Ulonglong(u) => AttrValue::Int(u as i64),
            AttributeValue::Ulonglongs(us) => AttrValue::IntList(us.into_iter().map(|u| u as i64).collect()),
            #[allow(unreachable_patterns)]
            other => AttrValue::Text(format!("{other:?}")),
        }
    }

    /// Convert into a value the netcdf crate can write.
    ///
    /// Integers that fit in 32 bits are written as `int`, wider ones as `int64`.
    pub fn to_netcdf(&self) -> AttributeValue {
        match self {
            AttrValue::Text(s) => AttributeValue::Str(s.clone()),
            AttrValue::TextList(ss) => AttributeValue::Strs(ss.clone()),
            AttrValue::Float(f) => AttributeValue::Double(*f),
            AttrValue::FloatList(fs) => AttributeValue::Doubles(fs.clone()),
            AttrValue::Int(i) => match i32::try_from(*i) {
                Ok(v) => AttributeValue::Int(v),
                Err(_) => AttributeValue::Longlong(*i),
            },
            AttrValue::IntList(is) => {
                let narrow: Option<Vec<i32>> = is.iter().map(|&i| i32::try_from(i).ok()).collect();
                match narrow {
                    Some(vs) => AttributeValue::Ints(vs),
                    None => AttributeValue::Longlongs(is.clone()),
                }
            }
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => write!(f, "\"{s}\""),
            AttrValue::Int(i) => write!(f, "{i}"),
            AttrValue::Float(v) => write!(f, "{v}"),
            AttrValue::TextList(ss) => write!(f, "{ss:?}"),
            AttrValue::IntList(is) => write!(f, "{is:?}"),
            AttrValue::FloatList(fs) => write!(f, "{fs:?}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(value: Vec<String>) -> Self {
        AttrValue::TextList(value)
    }
}

/// Read an attribute as scalar text
pub fn text_attr<'a>(attrs: &'a Attributes, name: &str) -> Option<&'a str> {
    attrs.get(name).and_then(AttrValue::as_text)
}
