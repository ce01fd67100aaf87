//! # KeyBox Codec
//!
//! Key part values and their canonical CBOR form.
//!
//! This crate provides:
//! - [`Value`], the dynamic value of one key part, hashable and totally comparable
//! - [`ValueType`], the declared type of a key part
//! - A deterministic CBOR encoder and a validating decoder
//! - [`EncodedKey`], the positional `{ typeId, parts }` key envelope
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by encoded key (length first, then bytewise)
//! - Integers and lengths use the shortest encoding
//! - No floats, no tags, no indefinite-length items
//!
//! ## Usage
//!
//! ```
//! use keybox_codec::{EncodedKey, Value};
//!
//! let key = EncodedKey::new(1, vec![Value::Integer(42), Value::from("RULED")]);
//! let bytes = key.encode();
//! assert_eq!(EncodedKey::decode(&bytes).unwrap(), key);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod key;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use key::{EncodedKey, KEY_ONLY_FIELD, PARTS_FIELD, TYPE_FIELD};
pub use value::{Value, ValueType};
