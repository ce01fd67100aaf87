//! Canonical CBOR encoder.

use crate::value::Value;
use std::cmp::Ordering;

/// Encode a value to canonical CBOR bytes.
///
/// Output is deterministic (RFC 8949 §4.2.1): shortest integer and length
/// headers, definite lengths only, and map entries ordered by their encoded
/// keys (length first, then bytewise). Two equal keys always encode to the
/// same bytes.
pub fn to_canonical_cbor(value: &Value) -> Vec<u8> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value);
    encoder.into_bytes()
}

/// A canonical CBOR encoder writing into an owned buffer.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one value.
    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(false) => self.buffer.push(0xf4),
            Value::Bool(true) => self.buffer.push(0xf5),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Bytes(b) => {
                self.write_header(2, b.len() as u64);
                self.buffer.extend_from_slice(b);
            }
            Value::Text(s) => {
                self.write_header(3, s.len() as u64);
                self.buffer.extend_from_slice(s.as_bytes());
            }
            Value::Array(items) => {
                self.write_header(4, items.len() as u64);
                for item in items {
                    self.encode(item);
                }
            }
            Value::Map(pairs) => self.encode_map(pairs),
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.write_header(0, n as u64);
        } else {
            // Major type 1 carries -1 - n, which is non-negative for every negative i64.
            self.write_header(1, (-1 - n) as u64);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_header(&mut self, major: u8, arg: u64) {
        let major = major << 5;
        match arg {
            0..=23 => self.buffer.push(major | arg as u8),
            24..=0xff => {
                self.buffer.push(major | 24);
                self.buffer.push(arg as u8);
            }
            0x100..=0xffff => {
                self.buffer.push(major | 25);
                self.buffer.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buffer.push(major | 26);
                self.buffer.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.buffer.push(major | 27);
                self.buffer.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    fn encode_map(&mut self, pairs: &[(Value, Value)]) {
        let mut entries: Vec<(Vec<u8>, &Value)> = pairs
            .iter()
            .map(|(k, v)| (to_canonical_cbor(k), v))
            .collect();
        entries.sort_by(|a, b| canonical_key_order(&a.0, &b.0));

        self.write_header(5, entries.len() as u64);
        for (key, value) in entries {
            self.buffer.extend_from_slice(&key);
            self.encode(value);
        }
    }
}

/// Ordering of encoded map keys: shorter first, then bytewise.
pub(crate) fn canonical_key_order(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_values() {
        assert_eq!(to_canonical_cbor(&Value::Null), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(false)), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)), vec![0xf5]);
    }

    #[test]
    fn integers_use_shortest_header() {
        assert_eq!(to_canonical_cbor(&Value::Integer(23)), vec![0x17]);
        assert_eq!(to_canonical_cbor(&Value::Integer(42)), vec![0x18, 42]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(256)),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(65536)),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)), vec![0x20]);
        assert_eq!(to_canonical_cbor(&Value::Integer(-100)), vec![0x38, 99]);
    }

    #[test]
    fn extreme_integers() {
        let min = to_canonical_cbor(&Value::Integer(i64::MIN));
        assert_eq!(min[0], 0x3b);
        assert_eq!(&min[1..], &(i64::MAX as u64).to_be_bytes());
    }

    #[test]
    fn text_and_bytes() {
        assert_eq!(
            to_canonical_cbor(&Value::from("RULED")),
            vec![0x65, b'R', b'U', b'L', b'E', b'D']
        );
        assert_eq!(
            to_canonical_cbor(&Value::Bytes(vec![1, 2, 3])),
            vec![0x43, 1, 2, 3]
        );
    }

    #[test]
    fn map_keys_sorted_by_encoding() {
        let map = Value::Map(vec![
            (Value::from("$keyOnly"), Value::Bool(true)),
            (Value::from("$"), Value::Array(vec![])),
            (Value::from("$type"), Value::Integer(1)),
        ]);
        let bytes = to_canonical_cbor(&map);
        // map(3), "$" first (shortest key), then "$type", then "$keyOnly"
        assert_eq!(&bytes[..3], &[0xa3, 0x61, b'$']);
        assert_eq!(&bytes[3], &0x80);
        assert_eq!(&bytes[4..10], &[0x65, b'$', b't', b'y', b'p', b'e']);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let a = Value::Map(vec![
            (Value::from("z"), Value::Integer(1)),
            (Value::from("a"), Value::Integer(2)),
        ]);
        let b = Value::Map(vec![
            (Value::from("a"), Value::Integer(2)),
            (Value::from("z"), Value::Integer(1)),
        ]);
        assert_eq!(to_canonical_cbor(&a), to_canonical_cbor(&b));
    }
}
