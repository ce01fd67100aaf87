//! Positional key envelope exchanged with serializers.
//!
//! An encoded key names its type by the compact type id handed out at
//! declaration time and lists the key parts in canonical index order:
//!
//! ```text
//! { "$type": <type id>, "$": [v0, v1, ...], "$keyOnly": true }
//! ```
//!
//! `"$keyOnly"` is present only when set; it tells the reader that the rest of
//! the object payload was omitted on this occasion.

use crate::decoder::from_cbor;
use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Map key holding the type id.
pub const TYPE_FIELD: &str = "$type";
/// Map key holding the positional parts.
pub const PARTS_FIELD: &str = "$";
/// Map key holding the key-only flag.
pub const KEY_ONLY_FIELD: &str = "$keyOnly";

/// A composite key in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedKey {
    /// Declaration-order id of the key's type.
    pub type_id: u32,
    /// Key parts in canonical index order.
    pub parts: Vec<Value>,
    /// Whether the accompanying payload carries only the key.
    pub key_only: bool,
}

impl EncodedKey {
    /// Creates an envelope for a full payload.
    pub fn new(type_id: u32, parts: Vec<Value>) -> Self {
        Self {
            type_id,
            parts,
            key_only: false,
        }
    }

    /// Marks the envelope as key-only.
    #[must_use]
    pub fn key_only(mut self, key_only: bool) -> Self {
        self.key_only = key_only;
        self
    }

    /// Converts the envelope into its map value.
    pub fn to_value(&self) -> Value {
        let mut pairs = vec![
            (
                Value::from(TYPE_FIELD),
                Value::Integer(i64::from(self.type_id)),
            ),
            (Value::from(PARTS_FIELD), Value::Array(self.parts.clone())),
        ];
        if self.key_only {
            pairs.push((Value::from(KEY_ONLY_FIELD), Value::Bool(true)));
        }
        Value::Map(pairs)
    }

    /// Reads an envelope back from its map value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidEnvelope`] if the value is not a map, the
    /// type id is missing or out of range, or the parts are not an array.
    pub fn from_value(value: &Value) -> CodecResult<Self> {
        if !matches!(value, Value::Map(_)) {
            return Err(CodecError::invalid_envelope(format!(
                "expected map, found {}",
                value.kind()
            )));
        }
        let type_id = value
            .get(TYPE_FIELD)
            .and_then(Value::as_integer)
            .ok_or_else(|| CodecError::invalid_envelope("missing integer $type"))?;
        let type_id = u32::try_from(type_id)
            .map_err(|_| CodecError::invalid_envelope(format!("type id {type_id} out of range")))?;
        let parts = value
            .get(PARTS_FIELD)
            .and_then(Value::as_array)
            .ok_or_else(|| CodecError::invalid_envelope("missing $ parts array"))?
            .to_vec();
        let key_only = match value.get(KEY_ONLY_FIELD) {
            None => false,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(CodecError::invalid_envelope(format!(
                    "$keyOnly must be bool, found {}",
                    other.kind()
                )))
            }
        };
        Ok(Self {
            type_id,
            parts,
            key_only,
        })
    }

    /// Encodes the envelope to canonical CBOR.
    pub fn encode(&self) -> Vec<u8> {
        to_canonical_cbor(&self.to_value())
    }

    /// Decodes an envelope from CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not canonical CBOR or do not hold a
    /// well-formed envelope.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        Self::from_value(&from_cbor(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_survives_cbor() {
        let key = EncodedKey::new(2, vec![Value::Integer(42), Value::from("RULED")]);
        let decoded = EncodedKey::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);
        assert!(!decoded.key_only);
    }

    #[test]
    fn key_only_flag_is_omitted_unless_set() {
        let plain = EncodedKey::new(0, vec![Value::Integer(1)]).to_value();
        assert!(plain.get(KEY_ONLY_FIELD).is_none());

        let flagged = EncodedKey::new(0, vec![Value::Integer(1)]).key_only(true);
        assert_eq!(
            flagged.to_value().get(KEY_ONLY_FIELD),
            Some(&Value::Bool(true))
        );
        assert!(EncodedKey::decode(&flagged.encode()).unwrap().key_only);
    }

    #[test]
    fn rejects_malformed_envelopes() {
        let not_map = Value::Array(vec![]);
        assert!(matches!(
            EncodedKey::from_value(&not_map),
            Err(CodecError::InvalidEnvelope { .. })
        ));

        let negative_type = Value::Map(vec![
            (Value::from(TYPE_FIELD), Value::Integer(-1)),
            (Value::from(PARTS_FIELD), Value::Array(vec![])),
        ]);
        assert!(matches!(
            EncodedKey::from_value(&negative_type),
            Err(CodecError::InvalidEnvelope { .. })
        ));

        let missing_parts = Value::Map(vec![(Value::from(TYPE_FIELD), Value::Integer(0))]);
        assert!(matches!(
            EncodedKey::from_value(&missing_parts),
            Err(CodecError::InvalidEnvelope { .. })
        ));
    }
}
