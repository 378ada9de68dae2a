//! Conversion between wire parameter sets and [`ParameterMap`].
//!
//! A wire parameter set is a list of `{ "name": .., "values": [rows] }` entries. Scalars
//! travel as a single row with the sole key `Value` (or `value`); everything else is a
//! table. Decoding collapses those single-key rows into [`ParamValue::Scalar`], encoding
//! expands them again, always spelling the key `Value`.
//!
//! `decode_list(encode(m)) == m` holds for every map whose scalars were produced by this
//! rule. It does not hold for ill-shaped entries (a single row whose sole key is some other
//! name, or a row carrying both spellings), which decode to one-row tables.

use serde_json::Value;
use tracing::debug;

use super::types::{ParamValue, ParameterMap, Row, WireEntry, WireParameterSet};
use crate::error::{Result, SorterError};

/// Key written for scalars on encode.
pub const SCALAR_KEY: &str = "Value";
const SCALAR_KEY_LOWER: &str = "value";

/// Parse `json_text` and decode the parameter list it carries.
///
/// With `model_key`, the payload must be an object holding the list under that key;
/// without it, the payload is the list itself.
pub fn decode_wire(json_text: &str, model_key: Option<&str>) -> Result<ParameterMap> {
    let payload: Value = serde_json::from_str(json_text)
        .map_err(|e| SorterError::malformed(format!("invalid JSON payload: {}", e)))?;
    decode_value(payload, model_key)
}

/// Same as [`decode_wire`] for an already-parsed payload.
pub fn decode_value(payload: Value, model_key: Option<&str>) -> Result<ParameterMap> {
    let list = match model_key {
        None => payload,
        Some(key) => match payload {
            Value::Object(mut object) => object
                .remove(key)
                .ok_or_else(|| SorterError::missing(key, "wire payload"))?,
            other => {
                return Err(SorterError::malformed(format!(
                    "expected an object holding '{}', found {}",
                    key,
                    json_kind(&other)
                )))
            }
        },
    };

    let entries: WireParameterSet = serde_json::from_value(list)
        .map_err(|e| SorterError::malformed(format!("invalid parameter list: {}", e)))?;
    Ok(decode_list(entries))
}

/// Build a parameter map from wire entries. Duplicate names: the later entry wins.
pub fn decode_list<I>(entries: I) -> ParameterMap
where
    I: IntoIterator<Item = WireEntry>,
{
    let mut map = ParameterMap::new();
    let mut count = 0usize;
    for entry in entries {
        if map.insert(entry.name.clone(), ParamValue::Table(entry.values)).is_some() {
            debug!(name = %entry.name, "duplicate parameter name, keeping the later entry");
        }
        count += 1;
    }
    flatten_scalars(&mut map);
    debug!(entries = count, parameters = map.len(), "decoded parameter list");
    map
}

/// Collapse every one-row table whose key set is exactly `{value}` or `{Value}` into a scalar.
pub fn flatten_scalars(map: &mut ParameterMap) {
    for slot in map.values_mut() {
        let scalar = match slot {
            ParamValue::Table(rows) if rows.len() == 1 => scalar_cell(&rows[0]).cloned(),
            _ => None,
        };
        if let Some(value) = scalar {
            *slot = ParamValue::Scalar(value);
        }
    }
}

/// The scalar carried by `row`, if `row` is a scalar-designating row.
fn scalar_cell(row: &Row) -> Option<&Value> {
    if row.len() != 1 {
        return None;
    }
    row.get(SCALAR_KEY).or_else(|| row.get(SCALAR_KEY_LOWER))
}

/// Produce the wire representation of `map`, in insertion order.
pub fn encode(map: &ParameterMap) -> WireParameterSet {
    map.iter()
        .map(|(name, value)| WireEntry {
            name: name.to_string(),
            values: match value {
                ParamValue::Table(rows) => rows.clone(),
                ParamValue::Scalar(scalar) => {
                    let mut row = Row::new();
                    row.insert(SCALAR_KEY.to_string(), scalar.clone());
                    vec![row]
                }
            },
        })
        .collect()
}

/// [`encode`] straight to a JSON value.
pub fn encode_value(map: &ParameterMap) -> Result<Value> {
    serde_json::to_value(encode(map))
        .map_err(|e| SorterError::malformed(format!("cannot encode parameter set: {}", e)))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
