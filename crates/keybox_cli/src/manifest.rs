//! JSON key model files.
//!
//! A model file lists the types of an object model and the key declared for
//! each keyed type:
//!
//! ```json
//! {
//!   "types": [
//!     { "name": "Customer", "properties": [{ "name": "Code", "type": "text" }] },
//!     { "name": "Order", "properties": [
//!         { "name": "Number", "type": "integer" },
//!         { "name": "Customer", "object": "Customer" }
//!     ] }
//!   ],
//!   "keys": [
//!     { "type": "Customer", "parts": { "Code": "/Code" } },
//!     { "type": "Order", "parts": { "Number": "/Number", "Client": "/Customer/Code" } }
//!   ]
//! }
//! ```
//!
//! A part whose spec is a value type name (`"integer"`, `"text"`, ...) is a
//! literal; anything else is a path.

use keybox_codec::ValueType;
use keybox_core::{
    InstanceFactory, KeyBoxConfig, KeyBoxError, KeyRegistry, KeySpec, PropertyDescriptor,
    RecordFactory, SchemaRegistry, SchemaSet, TypeCatalog, TypeDescriptor, TypeKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a model file.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not a valid model document.
    #[error("invalid model file: {0}")]
    Json(#[from] serde_json::Error),

    /// An entry is inconsistent.
    #[error("{entry}: {message}")]
    Invalid {
        /// Entry that failed.
        entry: String,
        /// What is wrong with it.
        message: String,
    },

    /// The catalog or the key declarations were rejected.
    #[error(transparent)]
    KeyBox(#[from] KeyBoxError),
}

/// Result type for model loading.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Kind of a declared type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindEntry {
    /// Concrete class.
    #[default]
    Class,
    /// Abstract class.
    Abstract,
    /// Interface.
    Interface,
    /// Value type.
    Value,
}

impl From<KindEntry> for TypeKind {
    fn from(kind: KindEntry) -> Self {
        match kind {
            KindEntry::Class => TypeKind::Class,
            KindEntry::Abstract => TypeKind::Abstract,
            KindEntry::Interface => TypeKind::Interface,
            KindEntry::Value => TypeKind::Value,
        }
    }
}

/// One type of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeEntry {
    /// Type name.
    pub name: String,
    /// Type kind.
    #[serde(default)]
    pub kind: KindEntry,
    /// Base class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Implemented interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    /// Properties declared by the type itself.
    #[serde(default)]
    pub properties: Vec<PropertyEntry>,
}

/// One property of a type; exactly one of `type` and `object` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyEntry {
    /// Property name.
    pub name: String,
    /// Value type of a value property.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ValueType>,
    /// Target type of an object property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    /// Whether the property may hold null.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the property can be written.
    #[serde(default = "default_writable")]
    pub writable: bool,
}

fn default_writable() -> bool {
    true
}

/// The key of one type: either parts or an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyEntry {
    /// Keyed type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Part name to part spec.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parts: BTreeMap<String, String>,
    /// Type whose key shape is reused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A model file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Types of the object model.
    #[serde(default)]
    pub types: Vec<TypeEntry>,
    /// Key declarations, in type id order.
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

impl Manifest {
    /// Reads a model file.
    pub fn load(path: &Path) -> ManifestResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses a model document.
    pub fn parse(text: &str) -> ManifestResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Builds the type catalog.
    pub fn catalog(&self) -> ManifestResult<TypeCatalog> {
        let mut catalog = TypeCatalog::new();
        for entry in &self.types {
            let mut descriptor = TypeDescriptor::new(entry.name.as_str(), entry.kind.into());
            if let Some(base) = &entry.extends {
                descriptor = descriptor.extends(base.as_str());
            }
            for interface in &entry.implements {
                descriptor = descriptor.implements(interface.as_str());
            }
            for property in &entry.properties {
                descriptor = descriptor.property(property.descriptor(&entry.name)?);
            }
            catalog.register(descriptor)?;
        }
        Ok(catalog)
    }

    /// Builds the catalog and commits every key declaration.
    pub fn compile(&self) -> ManifestResult<Model> {
        let catalog = Arc::new(self.catalog()?);
        let mut registry = SchemaRegistry::new(Arc::clone(&catalog));
        for key in &self.keys {
            match (&key.alias, key.parts.is_empty()) {
                (Some(example), true) => {
                    registry.declare_key_alias(&key.type_name, example)?;
                }
                (None, false) => {
                    let parts = key
                        .parts
                        .iter()
                        .map(|(name, spec)| (name.as_str(), part_spec(spec)));
                    registry.declare_key(&key.type_name, parts)?;
                }
                (Some(_), false) => {
                    return Err(invalid(&key.type_name, "a key has either parts or an alias"));
                }
                (None, true) => {
                    return Err(invalid(&key.type_name, "a key needs parts or an alias"));
                }
            }
        }
        let schemas = registry.commit()?;
        debug!(
            types = catalog.len(),
            keyed = schemas.len(),
            "compiled key model"
        );
        Ok(Model { catalog, schemas })
    }
}

impl PropertyEntry {
    fn descriptor(&self, owner: &str) -> ManifestResult<PropertyDescriptor> {
        let entry = format!("{owner}.{}", self.name);
        let mut descriptor = match (&self.value, &self.object) {
            (Some(ty), None) => PropertyDescriptor::value(self.name.as_str(), *ty),
            (None, Some(target)) => PropertyDescriptor::object(self.name.as_str(), target.as_str()),
            (Some(_), Some(_)) => {
                return Err(invalid(&entry, "a property has either a type or an object"))
            }
            (None, None) => return Err(invalid(&entry, "a property needs a type or an object")),
        };
        if self.nullable {
            descriptor = descriptor.nullable();
        }
        if !self.writable {
            descriptor = descriptor.read_only();
        }
        Ok(descriptor)
    }
}

/// Reads a part spec: a value type name is a literal, anything else a path.
pub fn part_spec(spec: &str) -> KeySpec {
    match spec.parse::<ValueType>() {
        Ok(ty) => KeySpec::Literal(ty),
        Err(_) => KeySpec::Path(spec.to_string()),
    }
}

fn invalid(entry: &str, message: &str) -> ManifestError {
    ManifestError::Invalid {
        entry: entry.to_string(),
        message: message.to_string(),
    }
}

/// A compiled model.
#[derive(Debug, Clone)]
pub struct Model {
    /// The type catalog.
    pub catalog: Arc<TypeCatalog>,
    /// The committed schemas.
    pub schemas: Arc<SchemaSet>,
}

impl Model {
    /// Loads and compiles a model file.
    pub fn load(path: &Path) -> ManifestResult<Self> {
        Manifest::load(path)?.compile()
    }

    /// A key registry over the model, creating records for its types.
    pub fn registry(&self, config: KeyBoxConfig) -> KeyRegistry {
        let factory: Arc<dyn InstanceFactory> =
            Arc::new(RecordFactory::new(Arc::clone(&self.catalog)));
        KeyRegistry::with_config(Arc::clone(&self.schemas), factory, config)
    }
}

/// Sample order model used by the command tests.
#[cfg(test)]
pub(crate) const ORDERS: &str = r#"{
    "types": [
        { "name": "IParty", "kind": "interface" },
        { "name": "Customer", "implements": ["IParty"], "properties": [
            { "name": "Code", "type": "text" },
            { "name": "Name", "type": "text" }
        ] },
        { "name": "Order", "properties": [
            { "name": "Number", "type": "integer" },
            { "name": "Customer", "object": "Customer" }
        ] },
        { "name": "Quote", "properties": [
            { "name": "Number", "type": "integer" },
            { "name": "Customer", "object": "Customer" }
        ] }
    ],
    "keys": [
        { "type": "Customer", "parts": { "Code": "/Code" } },
        { "type": "Order", "parts": { "Number": "/Number", "Client": "/Customer/Code", "Area": "text" } },
        { "type": "Quote", "alias": "Order" }
    ]
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn compiles_the_order_model() {
        let model = Manifest::parse(ORDERS).unwrap().compile().unwrap();
        assert_eq!(model.catalog.len(), 4);
        assert_eq!(model.schemas.len(), 3);
        let order = model.schemas.schema_of("Order").unwrap();
        assert_eq!(order.names().collect::<Vec<_>>(), ["Area", "Client", "Number"]);
        assert!(order.parts()[0].definition().is_literal());
        assert!(Arc::ptr_eq(order, model.schemas.schema_of("Quote").unwrap()));
    }

    #[test]
    fn loads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ORDERS.as_bytes()).unwrap();
        let model = Model::load(file.path()).unwrap();
        assert_eq!(model.schemas.type_id_of("Quote"), Some(2));
    }

    #[test]
    fn part_specs() {
        assert_eq!(part_spec("integer"), KeySpec::Literal(ValueType::Integer));
        assert_eq!(part_spec("/Code"), KeySpec::Path("/Code".into()));
        assert_eq!(part_spec("Code"), KeySpec::Path("Code".into()));
    }

    #[test]
    fn rejects_inconsistent_entries() {
        let both = r#"{ "types": [{ "name": "A", "properties": [
            { "name": "X", "type": "text", "object": "A" }
        ] }] }"#;
        let err = Manifest::parse(both).unwrap().catalog().unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { ref entry, .. } if entry == "A.X"));

        let keyless = r#"{ "types": [{ "name": "A" }], "keys": [{ "type": "A" }] }"#;
        let err = Manifest::parse(keyless).unwrap().compile().unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { .. }));

        assert!(matches!(
            Manifest::parse(r#"{ "tipes": [] }"#),
            Err(ManifestError::Json(_))
        ));
    }

    #[test]
    fn surfaces_declaration_errors() {
        let model = r#"{
            "types": [{ "name": "A" }, { "name": "B" }],
            "keys": [{ "type": "A", "alias": "B" }]
        }"#;
        let err = Manifest::parse(model).unwrap().compile().unwrap_err();
        assert_eq!(err.to_string(), "Keys not mapped for: A, B");
    }

    #[test]
    fn missing_files_report_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = Manifest::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
