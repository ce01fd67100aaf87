//! CLI command implementations.

pub mod check;
pub mod decode_key;
pub mod encode_key;
pub mod inspect;

use keybox_codec::{Value, ValueType};

/// Parses a command-line part value as the part's declared type.
///
/// Bytes are hex; `any` parts take an integer or `true`/`false` when the
/// text parses as one, and text otherwise.
pub fn parse_value(ty: ValueType, text: &str) -> Result<Value, String> {
    match ty {
        ValueType::Bool => text
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| format!("expected true or false, found {text:?}")),
        ValueType::Integer => text
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("expected an integer, found {text:?}")),
        ValueType::Text => Ok(Value::from(text)),
        ValueType::Bytes => hex_decode(text)
            .map(Value::Bytes)
            .ok_or_else(|| format!("expected hex bytes, found {text:?}")),
        ValueType::Any => Ok(text
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| text.parse::<bool>().map(Value::Bool))
            .unwrap_or_else(|_| Value::from(text))),
    }
}

/// Converts a key value to JSON; bytes become hex strings.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::String(hex_encode(b)),
        Value::Array(items) => items.iter().map(value_to_json).collect(),
        Value::Map(pairs) => serde_json::Value::Object(
            pairs
                .iter()
                .map(|(k, v)| {
                    let key = match k {
                        Value::Text(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key, value_to_json(v))
                })
                .collect(),
        ),
    }
}

/// Encodes bytes as lower-case hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Decodes hex, ignoring surrounding whitespace.
pub fn hex_decode(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}
