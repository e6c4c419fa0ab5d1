//! Mapping JSON documents onto [`Value`].
//!
//! JSON has no date or binary type, so two tagged object forms are
//! recognised:
//!
//! - `{"$date": <number>}` becomes [`Value::Date`]
//! - `{"$binary": [<byte>, ...]}` becomes [`Value::Binary`]
//!
//! Every other object becomes a plain [`Value::Object`].

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use serde_json::Value as Json;

/// Parse a JSON string into a [`Value`].
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] if the text is not JSON or a tagged
/// form is malformed.
pub fn from_json_str(text: &str) -> CodecResult<Value> {
    let json: Json =
        serde_json::from_str(text).map_err(|e| CodecError::invalid_json(e.to_string()))?;
    from_json(&json)
}

/// Convert a parsed JSON document into a [`Value`].
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] if a tagged form is malformed.
pub fn from_json(json: &Json) -> CodecResult<Value> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| CodecError::invalid_json(format!("number out of range: {n}"))),
        Json::String(s) => Ok(Value::Text(s.clone())),
        Json::Array(items) => items
            .iter()
            .map(from_json)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array),
        Json::Object(map) => {
            if map.len() == 1 {
                if let Some(date) = map.get("$date") {
                    return date
                        .as_f64()
                        .map(Value::Date)
                        .ok_or_else(|| CodecError::invalid_json("$date requires a number"));
                }
                if let Some(bytes) = map.get("$binary") {
                    return binary_from_json(bytes);
                }
            }
            map.iter()
                .map(|(k, v)| from_json(v).map(|v| (k.clone(), v)))
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Object)
        }
    }
}

fn binary_from_json(json: &Json) -> CodecResult<Value> {
    let items = json
        .as_array()
        .ok_or_else(|| CodecError::invalid_json("$binary requires an array of bytes"))?;
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or_else(|| CodecError::invalid_json(format!("not a byte: {item}")))
        })
        .collect::<CodecResult<Vec<u8>>>()
        .map(Value::Binary)
}
