//! Canonical JSON helpers.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::SweepError;

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => {
            let canonical_values = values.into_iter().map(canonicalize).collect();
            Value::Array(canonical_values)
        }
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, SweepError> {
    let value = to_canonical_value(value)?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &value)
        .map_err(|err| SweepError::serde("json_write", err))?;
    Ok(bytes)
}

/// Converts a value into a [`Value`] tree with recursively sorted object keys.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value, SweepError> {
    let value =
        serde_json::to_value(value).map_err(|err| SweepError::serde("json_serialize", err))?;
    Ok(canonicalize(value))
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, SweepError> {
    serde_json::from_slice(data).map_err(|err| SweepError::serde("json_deserialize", err))
}

/// Deserializes a value from an already parsed JSON tree.
pub fn from_json_value<T: DeserializeOwned>(value: Value) -> Result<T, SweepError> {
    serde_json::from_value(value).map_err(|err| SweepError::serde("json_deserialize", err))
}
