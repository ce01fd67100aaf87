//! Value-keyed cache of canonical instances.
//!
//! Instances are indexed by type and key values. Adding a second instance
//! under a key that is already cached merges it into the cached one: fields
//! the canonical instance has not set are filled from the incoming instance,
//! fields it has set are left alone.

use crate::error::{KeyBoxError, KeyBoxResult};
use crate::model::{same_instance, Instance, TypeCatalog, TypeKind};
use crate::ring::KeyRing;
use crate::values::KeyValues;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Canonical instances by `(type, key values)`.
pub struct ObjectCache {
    catalog: Arc<TypeCatalog>,
    entries: Mutex<HashMap<String, HashMap<KeyValues, Instance>>>,
}

impl ObjectCache {
    /// Creates an empty cache.
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up the canonical instance for a completed key.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyBoxError::IncompleteKey`] if the ring is not complete
    /// and [`KeyBoxError::TypeMismatch`] if the cached instance is not
    /// compatible with `declared`.
    pub fn try_get(&self, declared: &str, ring: &KeyRing) -> KeyBoxResult<Option<Instance>> {
        let key = completed_key(ring)?;
        let found = self
            .entries
            .lock()
            .get(declared)
            .and_then(|by_key| by_key.get(&key))
            .cloned();
        if let Some(instance) = &found {
            self.check_compatible(declared, instance.type_name())?;
        }
        Ok(found)
    }

    /// Adds `value` under the ring's key and returns the canonical instance.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyBoxError::NullValue`] for `None`,
    /// [`KeyBoxError::IncompleteKey`] if the ring is not complete, and
    /// [`KeyBoxError::TypeMismatch`] if `value` is not compatible with
    /// `declared`.
    pub fn add(
        &self,
        declared: &str,
        ring: &KeyRing,
        value: impl Into<Option<Instance>>,
    ) -> KeyBoxResult<Instance> {
        let value = value.into().ok_or(KeyBoxError::NullValue)?;
        let key = completed_key(ring)?;
        let actual = value.type_name().to_string();
        self.check_compatible(declared, &actual)?;

        let mut entries = self.entries.lock();
        let existing = entries
            .get(&actual)
            .and_then(|by_key| by_key.get(&key))
            .cloned();
        let canonical = match existing {
            Some(canonical) => {
                if !same_instance(&canonical, &value) {
                    let merged = self.merge(&canonical, &value)?;
                    trace!(type_name = %actual, merged, "merged into canonical instance");
                }
                canonical
            }
            None => {
                entries
                    .entry(actual.clone())
                    .or_default()
                    .insert(key.clone(), Arc::clone(&value));
                trace!(type_name = %actual, declared, "cached canonical instance");
                value
            }
        };
        if declared != actual {
            entries
                .entry(declared.to_string())
                .or_default()
                .insert(key, Arc::clone(&canonical));
        }
        Ok(canonical)
    }

    /// Number of cached entries across all types.
    pub fn len(&self) -> usize {
        self.entries.lock().values().map(HashMap::len).sum()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn check_compatible(&self, declared: &str, actual: &str) -> KeyBoxResult<()> {
        if declared == actual {
            return Ok(());
        }
        let declared_info = self.catalog.require(declared)?;
        let actual_info = self.catalog.require(actual)?;
        if declared_info.kind() == TypeKind::Interface && actual_info.implements(declared) {
            Ok(())
        } else {
            Err(KeyBoxError::type_mismatch(declared, actual))
        }
    }

    /// Copies set writable fields of `incoming` into unset fields of
    /// `canonical`; returns how many fields were copied.
    fn merge(&self, canonical: &Instance, incoming: &Instance) -> KeyBoxResult<usize> {
        let info = self.catalog.require(canonical.type_name())?;
        let mut merged = 0;
        for (index, property) in info.properties().iter().enumerate() {
            if !property.writable {
                continue;
            }
            let (Some(current), Some(offered)) = (canonical.field(index), incoming.field(index)) else {
                continue;
            };
            if current.is_unset() && !offered.is_unset() && canonical.set_field(index, offered) {
                merged += 1;
            }
        }
        Ok(merged)
    }
}

fn completed_key(ring: &KeyRing) -> KeyBoxResult<KeyValues> {
    if !ring.is_completed() {
        return Err(KeyBoxError::incomplete_key(ring.type_name()));
    }
    let key = ring.key_values()?;
    if key.has_null() {
        return Err(KeyBoxError::incomplete_key(ring.type_name()));
    }
    Ok(key)
}

impl std::fmt::Debug for ObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("ObjectCache")
            .field("types", &entries.len())
            .field("entries", &entries.values().map(HashMap::len).sum::<usize>())
            .finish_non_exhaustive()
    }
}
