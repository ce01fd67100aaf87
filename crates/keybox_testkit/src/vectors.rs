//! Key envelope test vectors.
//!
//! Fixed envelopes and their canonical CBOR bytes, shareable as JSON with
//! serializers written outside this workspace.

use keybox_codec::{EncodedKey, Value};
use serde::{Deserialize, Serialize};

/// A key part as it appears in a vector file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum VectorPart {
    /// Boolean part.
    Bool(bool),
    /// Integer part.
    Integer(i64),
    /// Text part.
    Text(String),
    /// Byte string part, hex-encoded.
    Bytes(String),
}

impl VectorPart {
    /// The part as a key value.
    pub fn to_value(&self) -> Value {
        match self {
            VectorPart::Bool(b) => Value::Bool(*b),
            VectorPart::Integer(n) => Value::Integer(*n),
            VectorPart::Text(s) => Value::Text(s.clone()),
            VectorPart::Bytes(hex) => Value::Bytes(from_hex(hex).expect("Invalid hex in vector")),
        }
    }
}

/// One envelope vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Type id of the envelope.
    pub type_id: u32,
    /// Parts in index order.
    pub parts: Vec<VectorPart>,
    /// Whether the envelope is key-only.
    pub key_only: bool,
    /// Canonical CBOR bytes (hex-encoded).
    pub expected_hex: String,
}

impl KeyVector {
    /// The envelope described by this vector.
    pub fn envelope(&self) -> EncodedKey {
        EncodedKey::new(self.type_id, self.parts.iter().map(VectorPart::to_value).collect())
            .key_only(self.key_only)
    }
}

/// Bytes that must not decode as an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Input bytes (hex-encoded).
    pub input_hex: String,
    /// Substring of the expected error message.
    pub expected_error: String,
}

/// Valid envelope vectors.
pub fn key_vectors() -> Vec<KeyVector> {
    vec![
        KeyVector {
            id: "single_integer".into(),
            description: "type 0 keyed by one integer".into(),
            type_id: 0,
            parts: vec![VectorPart::Integer(5)],
            key_only: false,
            expected_hex: "a26124810565247479706500".into(),
        },
        KeyVector {
            id: "composite_key_only".into(),
            description: "type 1 keyed by text and integer, key only".into(),
            type_id: 1,
            parts: vec![VectorPart::Text("core".into()), VectorPart::Integer(7)],
            key_only: true,
            expected_hex: "a361248264636f7265076524747970650168246b65794f6e6c79f5".into(),
        },
        KeyVector {
            id: "composite_ruled".into(),
            description: "type 2 keyed by 42 and \"RULED\"".into(),
            type_id: 2,
            parts: vec![VectorPart::Integer(42), VectorPart::Text("RULED".into())],
            key_only: false,
            expected_hex: "a2612482182a6552554c454465247479706502".into(),
        },
    ]
}

/// Invalid envelope vectors.
pub fn invalid_vectors() -> Vec<InvalidVector> {
    vec![
        InvalidVector {
            id: "missing_type".into(),
            input_hex: "a1612480".into(),
            expected_error: "$type".into(),
        },
        InvalidVector {
            id: "not_a_map".into(),
            input_hex: "8105".into(),
            expected_error: "expected map".into(),
        },
    ]
}

/// Every valid vector as pretty JSON.
pub fn key_vectors_json() -> String {
    serde_json::to_string_pretty(&key_vectors()).expect("Vectors serialize")
}

/// Encodes bytes as lower-case hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes hex; `None` for odd lengths or non-hex digits.
pub fn from_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_vectors_encode() {
        for vector in key_vectors() {
            assert_eq!(
                to_hex(&vector.envelope().encode()),
                vector.expected_hex,
                "vector {}",
                vector.id
            );
        }
    }

    #[test]
    fn test_key_vectors_decode() {
        for vector in key_vectors() {
            let bytes = from_hex(&vector.expected_hex).unwrap();
            assert_eq!(EncodedKey::decode(&bytes).unwrap(), vector.envelope());
        }
    }

    #[test]
    fn test_invalid_vectors() {
        for vector in invalid_vectors() {
            let bytes = from_hex(&vector.input_hex).unwrap();
            let err = EncodedKey::decode(&bytes).unwrap_err();
            assert!(
                err.to_string().contains(&vector.expected_error),
                "vector {}: {err}",
                vector.id
            );
        }
    }

    #[test]
    fn test_vectors_json_roundtrip() {
        let parsed: Vec<KeyVector> = serde_json::from_str(&key_vectors_json()).unwrap();
        assert_eq!(parsed.len(), key_vectors().len());
        assert_eq!(parsed[1].parts, key_vectors()[1].parts);
    }

    #[test]
    fn test_hex() {
        assert_eq!(to_hex(&[0x00, 0xab]), "00ab");
        assert_eq!(from_hex("00AB"), Some(vec![0x00, 0xab]));
        assert_eq!(from_hex("abc"), None);
        assert_eq!(from_hex("zz"), None);
    }
}
