//! Instance factories.

use crate::error::{KeyBoxError, KeyBoxResult};
use crate::model::catalog::{TypeCatalog, TypeKind};
use crate::model::entity::{Instance, Record};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Creates instances of declared types on demand.
///
/// Key rings call the factory to materialize missing intermediate objects
/// along a path and to create the source of an instance-less ring.
pub trait InstanceFactory: Send + Sync {
    /// Creates a fresh instance of `type_name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the type cannot be instantiated.
    fn create(&self, type_name: &str) -> KeyBoxResult<Instance>;
}

impl<F> InstanceFactory for F
where
    F: Fn(&str) -> KeyBoxResult<Instance> + Send + Sync,
{
    fn create(&self, type_name: &str) -> KeyBoxResult<Instance> {
        self(type_name)
    }
}

/// Factory producing [`Record`]s for catalog types.
///
/// Abstract classes and interfaces are instantiated through explicit
/// bindings to a concrete class.
#[derive(Debug, Clone)]
pub struct RecordFactory {
    catalog: Arc<TypeCatalog>,
    bindings: HashMap<String, String>,
}

impl RecordFactory {
    /// Creates a factory over a catalog.
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            bindings: HashMap::new(),
        }
    }

    /// Binds an abstract type to the class created in its place.
    #[must_use]
    pub fn bind(mut self, abstraction: impl Into<String>, implementation: impl Into<String>) -> Self {
        self.bindings.insert(abstraction.into(), implementation.into());
        self
    }

    /// The catalog this factory draws from.
    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }
}

impl InstanceFactory for RecordFactory {
    fn create(&self, type_name: &str) -> KeyBoxResult<Instance> {
        let target = self.bindings.get(type_name).map_or(type_name, String::as_str);
        let info = self.catalog.require(target)?;
        match info.kind() {
            TypeKind::Class => {
                trace!(type_name, target, "creating record");
                Ok(Arc::new(Record::new(Arc::clone(info))))
            }
            TypeKind::Abstract | TypeKind::Interface => Err(KeyBoxError::not_instantiable(
                type_name,
                "no concrete class is bound to it",
            )),
            TypeKind::Value => Err(KeyBoxError::not_instantiable(type_name, "it is a value type")),
        }
    }
}
