//! Key envelopes for serializers.
//!
//! An instance's key is written as an [`EncodedKey`]: the type id of the
//! nearest declared type and the part values in canonical order. Decoding
//! produces an instance-less ring with every part set, which instantiates its
//! source once complete (see [`KeyBoxConfig`](crate::KeyBoxConfig)).

use crate::error::{KeyBoxError, KeyBoxResult};
use crate::identity::KeyRegistry;
use crate::model::Instance;
use crate::ring::KeyRing;
use keybox_codec::EncodedKey;
use std::sync::Arc;
use tracing::trace;

/// A key read back from its envelope.
#[derive(Debug, Clone)]
pub struct DecodedKey {
    /// Declared type named by the envelope.
    pub type_name: String,
    /// Instance-less ring holding the decoded parts.
    pub ring: Arc<KeyRing>,
    /// Whether the payload carried only the key.
    pub key_only: bool,
}

impl DecodedKey {
    /// The ring's source, if decoding completed the key and created it.
    ///
    /// Once handed out, the instance keeps its ring attached after this
    /// `DecodedKey` is dropped.
    pub fn instance(&self) -> Option<Instance> {
        self.ring.source()
    }
}

impl KeyRegistry {
    /// Builds the envelope for an instance's key.
    ///
    /// Returns `Ok(None)` when no schema applies to the instance.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyBoxError::IncompleteKey`] if a part is null, or with
    /// any error raised while reading the parts.
    pub fn encode_key(&self, instance: &Instance, key_only: bool) -> KeyBoxResult<Option<EncodedKey>> {
        let Some(ring) = self.key_ring_for(instance)? else {
            return Ok(None);
        };
        let declared = self
            .schemas()
            .declared_ancestor(instance.type_name())
            .unwrap_or(ring.schema().owner())
            .to_string();
        self.encode_ring(&declared, &ring, key_only).map(Some)
    }

    /// Builds the envelope for a ring's key under `declared_type`'s type id.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyBoxError::UnknownType`] if the type was never
    /// declared and [`KeyBoxError::IncompleteKey`] if a part is null.
    pub fn encode_ring(
        &self,
        declared_type: &str,
        ring: &KeyRing,
        key_only: bool,
    ) -> KeyBoxResult<EncodedKey> {
        let type_id = self
            .type_id_of(declared_type)
            .ok_or_else(|| KeyBoxError::unknown_type(declared_type))?;
        let values = ring.key_values()?;
        if values.has_null() {
            return Err(KeyBoxError::incomplete_key(ring.type_name()));
        }
        trace!(type_name = declared_type, type_id, "encoded key");
        Ok(EncodedKey::new(type_id, values.into_inner()).key_only(key_only))
    }

    /// Reads an envelope into an instance-less ring.
    ///
    /// # Errors
    ///
    /// Fails for malformed CBOR, unknown type ids, a part count that does not
    /// match the schema, and values the parts do not accept.
    pub fn decode_key(&self, bytes: &[u8]) -> KeyBoxResult<DecodedKey> {
        let key = EncodedKey::decode(bytes)?;
        self.decode_envelope(&key)
    }

    /// Applies an already decoded envelope to a new instance-less ring.
    ///
    /// # Errors
    ///
    /// As [`decode_key`](Self::decode_key), without the CBOR errors.
    pub fn decode_envelope(&self, key: &EncodedKey) -> KeyBoxResult<DecodedKey> {
        let type_name = self
            .type_by_id(key.type_id)
            .ok_or(KeyBoxError::UnknownTypeId {
                type_id: key.type_id,
            })?
            .to_string();
        let ring = self
            .key_ring_for_type(&type_name)?
            .ok_or_else(|| KeyBoxError::NoSchema {
                type_name: type_name.clone(),
            })?;
        if ring.part_count() != key.parts.len() {
            return Err(KeyBoxError::PartCountMismatch {
                type_name,
                expected: ring.part_count(),
                actual: key.parts.len(),
            });
        }
        for (index, value) in key.parts.iter().enumerate() {
            ring.set_at(index, value.clone())?;
        }
        trace!(type_name = %type_name, type_id = key.type_id, "decoded key");
        Ok(DecodedKey {
            type_name,
            ring,
            key_only: key.key_only,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyBoxConfig;
    use crate::model::{RecordFactory, TypeCatalog, TypeDescriptor};
    use crate::schema::{KeySpec, SchemaRegistry};
    use keybox_codec::{Value, ValueType};

    fn registry(config: KeyBoxConfig) -> KeyRegistry {
        let mut catalog = TypeCatalog::new();
        catalog
            .register_all([
                TypeDescriptor::class("Note"),
                TypeDescriptor::class("Ticket")
                    .value("Number", ValueType::Integer)
                    .value("Title", ValueType::Text),
                TypeDescriptor::class("Bug").extends("Ticket"),
            ])
            .unwrap();
        let catalog = Arc::new(catalog);
        let mut schemas = SchemaRegistry::new(Arc::clone(&catalog));
        schemas
            .declare_key("Note", [("ID", ValueType::Integer)])
            .unwrap()
            .declare_key(
                "Ticket",
                [
                    ("Area", KeySpec::from(ValueType::Text)),
                    ("Number", KeySpec::from("/Number")),
                ],
            )
            .unwrap();
        let schemas = schemas.commit().unwrap();
        KeyRegistry::with_config(schemas, Arc::new(RecordFactory::new(catalog)), config)
    }

    #[test]
    fn encodes_complete_keys_under_nearest_declared_type() {
        let registry = registry(KeyBoxConfig::default());
        let bug = registry.factory().create("Bug").unwrap();
        let ring = registry.key_ring_for(&bug).unwrap().unwrap();
        ring.set("Area", "core").unwrap().set("Number", 7).unwrap();

        let key = registry.encode_key(&bug, true).unwrap().unwrap();
        assert_eq!(key.type_id, 1);
        assert_eq!(key.parts, vec![Value::from("core"), Value::Integer(7)]);
        assert!(key.key_only);
    }

    #[test]
    fn incomplete_keys_are_not_encoded() {
        let registry = registry(KeyBoxConfig::default());
        let ticket = registry.factory().create("Ticket").unwrap();
        registry.key_ring_for(&ticket).unwrap().unwrap().set("Area", "core").unwrap();
        assert!(matches!(
            registry.encode_key(&ticket, false),
            Err(KeyBoxError::IncompleteKey { .. })
        ));
    }

    #[test]
    fn decoding_instantiates_the_source() {
        let registry = registry(KeyBoxConfig::default());
        let bytes = EncodedKey::new(1, vec![Value::from("core"), Value::Integer(7)]).encode();
        let decoded = registry.decode_key(&bytes).unwrap();
        assert_eq!(decoded.type_name, "Ticket");
        assert!(!decoded.key_only);

        let instance = decoded.instance().unwrap();
        let ring = registry.key_ring_for(&instance).unwrap().unwrap();
        assert!(Arc::ptr_eq(&ring, &decoded.ring));
        let number = registry.catalog().read(instance.as_ref(), "Number").unwrap();
        assert_eq!(number.as_value(), Some(&Value::Integer(7)));
    }

    #[test]
    fn decoding_without_instantiation_keeps_values_staged() {
        let registry = registry(KeyBoxConfig::default().instantiate_on_complete(false));
        let bytes = EncodedKey::new(0, vec![Value::Integer(5)]).encode();
        let decoded = registry.decode_key(&bytes).unwrap();
        assert!(decoded.instance().is_none());
        assert_eq!(decoded.ring.get("ID").unwrap(), Value::Integer(5));
    }

    #[test]
    fn rejects_unknown_ids_and_wrong_arity() {
        let registry = registry(KeyBoxConfig::default());
        let unknown = EncodedKey::new(9, vec![]).encode();
        assert!(matches!(
            registry.decode_key(&unknown),
            Err(KeyBoxError::UnknownTypeId { type_id: 9 })
        ));
        let short = EncodedKey::new(1, vec![Value::from("core")]).encode();
        assert!(matches!(
            registry.decode_key(&short),
            Err(KeyBoxError::PartCountMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            registry.decode_key(&[0xff]),
            Err(KeyBoxError::Codec(_))
        ));
    }
}
