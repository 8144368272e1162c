//! Lenient deserializers for Move values rendered as JSON
//!
//! The fullnode renders `u64` as a decimal string, `u8`/`u16`/`u32` as
//! numbers, `ID` as either a string or `{ "id": "0x.." }`, and nested
//! structs as `{ "type": .., "fields": { .. } }`. Fields that are missing or
//! unreadable fall back to their default instead of failing the record.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read an unsigned integer from a string or number, defaulting to 0.
pub fn u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(value_as_u64).unwrap_or(0))
}

pub fn u8_lenient<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .map(value_as_u64)
        .and_then(|v| u8::try_from(v).ok())
        .unwrap_or(0))
}

/// Read a bool from a JSON bool or `"true"`, defaulting to false.
pub fn bool_lenient<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    })
}

/// Read an address or object id, accepting `{ "id": .. }` wrappers.
pub fn string_lenient<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(value_as_string).unwrap_or_default())
}

pub fn value_as_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Object(_) => unwrap_struct(value)
            .get("value")
            .map(value_as_u64)
            .unwrap_or(0),
        _ => 0,
    }
}

pub fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => {
            if let Some(id) = map.get("id") {
                return value_as_string(id);
            }
            let inner = unwrap_struct(value);
            if !std::ptr::eq(inner, value) {
                return value_as_string(inner);
            }
            String::new()
        }
        _ => String::new(),
    }
}

/// Descend into `{ "type": .., "fields": {..} }` if present.
pub fn unwrap_struct(value: &Value) -> &Value {
    match value.get("fields") {
        Some(fields) if fields.is_object() => fields,
        _ => value,
    }
}
