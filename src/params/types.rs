use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SorterError};

/// One row of a tabular parameter: column name to cell value, in column order.
pub type Row = Map<String, Value>;

/// A `{ "name": .., "values": [..] }` entry of a wire parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEntry {
    pub name: String,
    pub values: Vec<Row>,
}

/// The wire representation of a whole parameter set.
pub type WireParameterSet = Vec<WireEntry>;

/// A decoded parameter: either a bare scalar or a table of rows.
///
/// The tag is decided once, at decode time, by [`crate::params::flatten_scalars`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(Value),
    Table(Vec<Row>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            ParamValue::Scalar(value) => Some(value),
            ParamValue::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&[Row]> {
        match self {
            ParamValue::Scalar(_) => None,
            ParamValue::Table(rows) => Some(rows),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ParamValue::Scalar(_))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Scalar(Value::from(value))
    }
}

impl From<Vec<Row>> for ParamValue {
    fn from(rows: Vec<Row>) -> Self {
        ParamValue::Table(rows)
    }
}

/// Parameter name to value, kept in insertion order.
///
/// Inserting an existing name replaces its value in place (last write wins).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite `name`, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut ParamValue> {
        self.entries.iter_mut().map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Look up an entry, failing with `MissingKey` when absent.
    pub fn require(&self, name: &str) -> Result<&ParamValue> {
        self.get(name)
            .ok_or_else(|| SorterError::missing(name, "parameter map"))
    }

    /// The raw scalar stored under `name`.
    ///
    /// A single-row table here means the decode rule refused to flatten it (unknown sole key,
    /// or both `value` and `Value` present), which is reported as `AmbiguousScalar`.
    pub fn scalar(&self, name: &str) -> Result<&Value> {
        match self.require(name)? {
            ParamValue::Scalar(value) => Ok(value),
            ParamValue::Table(rows) if rows.len() == 1 => Err(SorterError::AmbiguousScalar {
                name: name.to_string(),
                keys: rows[0].keys().cloned().collect(),
            }),
            ParamValue::Table(rows) => Err(SorterError::malformed(format!(
                "parameter '{}' is a table with {} rows, expected a scalar",
                name,
                rows.len()
            ))),
        }
    }

    pub fn scalar_f64(&self, name: &str) -> Result<f64> {
        let value = self.scalar(name)?;
        value_as_f64(value).ok_or_else(|| {
            SorterError::malformed(format!("parameter '{}' is not numeric: {}", name, value))
        })
    }

    pub fn scalar_bool(&self, name: &str) -> Result<bool> {
        let value = self.scalar(name)?;
        value_as_bool(value).ok_or_else(|| {
            SorterError::malformed(format!("parameter '{}' is not a boolean: {}", name, value))
        })
    }

    pub fn table(&self, name: &str) -> Result<&[Row]> {
        match self.require(name)? {
            ParamValue::Table(rows) => Ok(rows),
            ParamValue::Scalar(value) => Err(SorterError::malformed(format!(
                "parameter '{}' is a scalar ({}), expected a table",
                name, value
            ))),
        }
    }
}

impl FromIterator<(String, ParamValue)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        let mut map = ParameterMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl IntoIterator for ParameterMap {
    type Item = (String, ParamValue);
    type IntoIter = std::vec::IntoIter<(String, ParamValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Decoded input models by name (e.g. `"F1.SVJD"`, `"Settings"`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSet {
    models: BTreeMap<String, ParameterMap>,
}

impl ModelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, params: ParameterMap) {
        self.models.insert(name.into(), params);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterMap> {
        self.models.get(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn model(&self, name: &str) -> Result<&ParameterMap> {
        self.get(name)
            .ok_or_else(|| SorterError::missing(name, "input models"))
    }

    /// Numeric scalar `param` of model `model`.
    pub fn scalar_f64(&self, model: &str, param: &str) -> Result<f64> {
        self.model(model)?
            .scalar_f64(param)
            .map_err(|e| with_model_context(e, model))
    }

    pub fn scalar(&self, model: &str, param: &str) -> Result<&Value> {
        self.model(model)?
            .scalar(param)
            .map_err(|e| with_model_context(e, model))
    }

    pub fn require(&self, model: &str, param: &str) -> Result<&ParamValue> {
        self.model(model)?
            .require(param)
            .map_err(|e| with_model_context(e, model))
    }

    pub fn table(&self, model: &str, param: &str) -> Result<&[Row]> {
        self.model(model)?
            .table(param)
            .map_err(|e| with_model_context(e, model))
    }
}

fn with_model_context(err: SorterError, model: &str) -> SorterError {
    match err {
        SorterError::MissingKey { key, .. } => SorterError::missing(key, format!("model '{}'", model)),
        other => other,
    }
}

/// Read a wire cell as a number. Upstream stages write numbers as strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A missing cell in a spreadsheet-compiled table: null or blank text.
pub fn is_gap(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
