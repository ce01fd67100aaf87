//! # KeyBox Core
//!
//! Composite-key resolution and identity map.
//!
//! This crate provides:
//! - A type catalog describing the shape of keyed objects ([`TypeCatalog`])
//! - Key declarations compiled into validated schemas ([`SchemaRegistry`])
//! - Per-instance key accessors that read through object graphs ([`KeyRing`])
//! - An identity map attaching one ring to each live instance ([`KeyRegistry`])
//! - A value-keyed cache that canonicalizes instances ([`ObjectCache`])
//!
//! ## Key Parts
//!
//! A key part is one of:
//! - a literal, stored in the ring itself
//! - a path such as `/Order/Number`, read from the object graph
//! - a foreign key such as `/Order/Customer`, where the last segment names a
//!   part of the related object's key
//!
//! Parts are indexed by sorted name; the index order is the wire order.
//!
//! ## Example
//!
//! ```rust
//! use keybox_core::{
//!     KeyRegistry, RecordFactory, SchemaRegistry, TypeCatalog, TypeDescriptor,
//! };
//! use keybox_codec::{Value, ValueType};
//! use std::sync::Arc;
//!
//! let mut catalog = TypeCatalog::new();
//! catalog.register(TypeDescriptor::class("Poco")).unwrap();
//! let catalog = Arc::new(catalog);
//!
//! let mut schemas = SchemaRegistry::new(Arc::clone(&catalog));
//! schemas.declare_key("Poco", [("ID", ValueType::Integer)]).unwrap();
//! let schemas = schemas.commit().unwrap();
//!
//! let registry = KeyRegistry::new(schemas, Arc::new(RecordFactory::new(catalog)));
//! let poco = registry.factory().create("Poco").unwrap();
//! let ring = registry.key_ring_for(&poco).unwrap().unwrap();
//! assert!(!ring.is_completed());
//! ring.set("ID", 42).unwrap();
//! assert!(ring.is_completed());
//! assert_eq!(ring.get("ID").unwrap(), Value::Integer(42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod identity;
mod model;
mod ring;
mod schema;
mod values;
mod wire;

pub use cache::ObjectCache;
pub use config::KeyBoxConfig;
pub use error::{ForeignKeyIssue, KeyBoxError, KeyBoxResult};
pub use identity::KeyRegistry;
pub use model::{
    same_instance, Entity, Field, Instance, InstanceFactory, PropertyDescriptor, PropertyType,
    Record, RecordFactory, TypeCatalog, TypeDescriptor, TypeInfo, TypeKind,
};
pub use ring::{Entries, KeyRing, Values};
pub use schema::{
    KeyDefinition, KeyPart, KeySpec, PathStep, PropertyPath, RegistryState, Schema,
    SchemaRegistry, SchemaSet,
};
pub use values::{KeyValues, EMPTY_KEY_HASH};
pub use wire::DecodedKey;

/// Re-exported value types used in every key.
pub use keybox_codec::{EncodedKey, Value, ValueType};

/// Crate version, as reported by tools built on this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
