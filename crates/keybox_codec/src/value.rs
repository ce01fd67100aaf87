//! Dynamic key part values and their declared types.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A dynamic key part value.
///
/// Floats are not representable, which keeps `Value` totally comparable and
/// hashable so that composite keys can be used directly as map keys.
/// `Value::Null` marks an empty key slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Value {
    /// Null value (an unset key part).
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Text string (UTF-8).
    Text(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Map of key-value pairs. Pair order is normalized by the encoder.
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Look up a text key in this map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(pairs) => pairs
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => {
                f.write_str("h'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Declared type of a key part.
///
/// Decoders use it to pick how a positional key part is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Boolean.
    Bool,
    /// Signed integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
    /// Any value.
    Any,
}

impl ValueType {
    /// Every value type, in declaration order.
    pub const ALL: [ValueType; 5] = [
        ValueType::Bool,
        ValueType::Integer,
        ValueType::Text,
        ValueType::Bytes,
        ValueType::Any,
    ];

    /// Whether a value may be stored in a part of this type.
    ///
    /// `Null` is accepted by every type; it clears the part.
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ValueType::Any, _)
                | (ValueType::Bool, Value::Bool(_))
                | (ValueType::Integer, Value::Integer(_))
                | (ValueType::Text, Value::Text(_))
                | (ValueType::Bytes, Value::Bytes(_))
        )
    }

    /// Lower case name of this type.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Integer => "integer",
            ValueType::Text => "text",
            ValueType::Bytes => "bytes",
            ValueType::Any => "any",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| CodecError::UnknownValueType {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn values_are_hashable() {
        let mut set = HashSet::new();
        set.insert(Value::Integer(42));
        set.insert(Value::from("RULED"));
        set.insert(Value::Integer(42));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert!(Value::default().is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Integer(42).as_text(), None);
        assert_eq!(Value::from("x").as_text(), Some("x"));
        assert_eq!(Value::from(vec![1u8, 2]).as_bytes(), Some(&[1, 2][..]));
    }

    #[test]
    fn map_get() {
        let map = Value::Map(vec![(Value::from("$type"), Value::Integer(3))]);
        assert_eq!(map.get("$type"), Some(&Value::Integer(3)));
        assert_eq!(map.get("$"), None);
        assert_eq!(Value::Integer(1).get("$type"), None);
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Integer(7));
    }

    #[test]
    fn value_type_accepts() {
        assert!(ValueType::Integer.accepts(&Value::Integer(1)));
        assert!(ValueType::Integer.accepts(&Value::Null));
        assert!(!ValueType::Integer.accepts(&Value::from("1")));
        assert!(ValueType::Any.accepts(&Value::Array(vec![])));
        assert!(!ValueType::Text.accepts(&Value::Bool(false)));
    }

    #[test]
    fn value_type_names_parse_back() {
        for ty in ValueType::ALL {
            assert_eq!(ty.name().parse::<ValueType>().unwrap(), ty);
        }
        assert!(matches!(
            "float".parse::<ValueType>(),
            Err(CodecError::UnknownValueType { .. })
        ));
    }

    #[test]
    fn value_type_serde_uses_lowercase() {
        let json = serde_json::to_string(&ValueType::Integer).unwrap();
        assert_eq!(json, "\"integer\"");
        let back: ValueType = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(back, ValueType::Text);
    }

    #[test]
    fn display_is_readable() {
        let v = Value::Array(vec![Value::Integer(42), Value::from("RULED")]);
        assert_eq!(v.to_string(), "[42, \"RULED\"]");
        assert_eq!(Value::Bytes(vec![0xab, 0x01]).to_string(), "h'ab01'");
    }
}
