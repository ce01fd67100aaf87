//! Identity map from live instances to their key rings.
//!
//! Attachments are keyed by the address of the instance's allocation and
//! validated by a weak reference, so the registry never keeps an instance
//! alive. Attachment is striped across several mutexes: first access to two
//! instances only contends when their tokens land on the same stripe.
//!
//! A ring that created its own instance owns it until the instance is handed
//! out; until then the attachment refers to the ring weakly. Once handed out,
//! the attachment keeps the ring for as long as the instance lives.

use crate::config::KeyBoxConfig;
use crate::error::{KeyBoxError, KeyBoxResult};
use crate::model::{identity, Entity, Instance, InstanceFactory, TypeCatalog};
use crate::ring::KeyRing;
use crate::schema::{Schema, SchemaSet};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

enum RingRef {
    /// Kept for as long as the instance lives.
    Shared(Arc<KeyRing>),
    /// Ring that created the instance and still owns it; nobody else has
    /// seen the instance yet.
    Owner(Weak<KeyRing>),
}

struct Attachment {
    source: Weak<dyn Entity>,
    ring: RingRef,
}

impl Attachment {
    fn live_ring(&self) -> Option<Arc<KeyRing>> {
        if self.source.strong_count() == 0 {
            return None;
        }
        match &self.ring {
            RingRef::Shared(ring) => Some(Arc::clone(ring)),
            RingRef::Owner(ring) => ring.upgrade(),
        }
    }
}

type Shard = Mutex<HashMap<usize, Attachment>>;

pub(crate) struct RegistryInner {
    schemas: Arc<SchemaSet>,
    factory: Arc<dyn InstanceFactory>,
    config: KeyBoxConfig,
    shards: Vec<Shard>,
    resolved: RwLock<HashMap<String, Option<Arc<Schema>>>>,
    attachments: AtomicUsize,
}

impl RegistryInner {
    pub(crate) fn factory(&self) -> &Arc<dyn InstanceFactory> {
        &self.factory
    }

    pub(crate) fn config(&self) -> &KeyBoxConfig {
        &self.config
    }

    fn shard(&self, token: usize) -> &Shard {
        // Allocation addresses share their low bits; spread them first.
        let mixed = (token as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 32;
        &self.shards[mixed as usize % self.shards.len()]
    }

    /// Memoized schema resolution.
    pub(crate) fn resolve(&self, type_name: &str) -> KeyBoxResult<Option<Arc<Schema>>> {
        if let Some(schema) = self.resolved.read().get(type_name) {
            return Ok(schema.clone());
        }
        let schema = self.schemas.resolve(type_name)?;
        self.resolved
            .write()
            .insert(type_name.to_string(), schema.clone());
        Ok(schema)
    }

    pub(crate) fn ring_for_instance(
        self: &Arc<Self>,
        instance: &Instance,
    ) -> KeyBoxResult<Option<Arc<KeyRing>>> {
        let token = identity(instance);
        if let Some(ring) = self.shard(token).lock().get(&token).and_then(Attachment::live_ring) {
            return Ok(Some(ring));
        }

        let Some(schema) = self.resolve(instance.type_name())? else {
            return Ok(None);
        };
        let ring = KeyRing::bound(schema, instance, Arc::downgrade(self));
        Ok(Some(self.attach(instance, &ring, false)))
    }

    /// Attaches `ring` to `instance` unless a live ring is already attached,
    /// and returns whichever ring ends up attached.
    pub(crate) fn attach(&self, instance: &Instance, ring: &Arc<KeyRing>, owner: bool) -> Arc<KeyRing> {
        let token = identity(instance);
        let attached = {
            let mut shard = self.shard(token).lock();
            if let Some(existing) = shard.get(&token) {
                if let Some(live) = existing.live_ring() {
                    return live;
                }
                warn!(
                    type_name = instance.type_name(),
                    "replacing stale key ring attachment"
                );
            }
            let ring_ref = if owner {
                RingRef::Owner(Arc::downgrade(ring))
            } else {
                RingRef::Shared(Arc::clone(ring))
            };
            shard.insert(
                token,
                Attachment {
                    source: Arc::downgrade(instance),
                    ring: ring_ref,
                },
            );
            Arc::clone(ring)
        };

        debug!(type_name = instance.type_name(), owner, "attached key ring");
        let count = self.attachments.fetch_add(1, Ordering::Relaxed) + 1;
        let interval = self.config.purge_interval;
        if interval > 0 && count % interval == 0 {
            self.purge();
        }
        attached
    }

    /// Switches an owning attachment to a shared one once the ring has
    /// handed its source out.
    pub(crate) fn promote(&self, instance: &Instance, ring: &Arc<KeyRing>) {
        let token = identity(instance);
        let mut shard = self.shard(token).lock();
        let Some(attachment) = shard.get_mut(&token) else {
            return;
        };
        if let RingRef::Owner(owner) = &attachment.ring {
            if std::ptr::eq(owner.as_ptr(), Arc::as_ptr(ring)) {
                attachment.ring = RingRef::Shared(Arc::clone(ring));
                debug!(type_name = instance.type_name(), "key ring source handed out");
            }
        }
    }

    fn purge(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut shard = shard.lock();
            let before = shard.len();
            shard.retain(|_, attachment| attachment.live_ring().is_some());
            removed += before - shard.len();
        }
        if removed > 0 {
            debug!(removed, "purged released key ring attachments");
        }
        removed
    }
}

/// Identity map from live instances to their key rings.
///
/// Cloning is cheap; clones share the same attachments.
#[derive(Clone)]
pub struct KeyRegistry {
    inner: Arc<RegistryInner>,
}

impl KeyRegistry {
    /// Creates a registry with the default configuration.
    pub fn new(schemas: Arc<SchemaSet>, factory: Arc<dyn InstanceFactory>) -> Self {
        Self::with_config(schemas, factory, KeyBoxConfig::default())
    }

    /// Creates a registry with a custom configuration.
    pub fn with_config(
        schemas: Arc<SchemaSet>,
        factory: Arc<dyn InstanceFactory>,
        config: KeyBoxConfig,
    ) -> Self {
        let shards = (0..config.shards.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            inner: Arc::new(RegistryInner {
                schemas,
                factory,
                config,
                shards,
                resolved: RwLock::new(HashMap::new()),
                attachments: AtomicUsize::new(0),
            }),
        }
    }

    /// The committed schemas.
    pub fn schemas(&self) -> &Arc<SchemaSet> {
        &self.inner.schemas
    }

    /// The type catalog.
    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        self.inner.schemas.catalog()
    }

    /// The instance factory.
    pub fn factory(&self) -> &Arc<dyn InstanceFactory> {
        &self.inner.factory
    }

    /// The registry configuration.
    pub fn config(&self) -> &KeyBoxConfig {
        &self.inner.config
    }

    /// Returns the key ring attached to `instance`, attaching a new one on
    /// first access.
    ///
    /// Returns `Ok(None)` when no schema applies to the instance's type.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyBoxError::NullInstance`] for `None` and
    /// [`KeyBoxError::UnknownType`] if the instance's type is not in the
    /// catalog.
    pub fn key_ring_for<'a>(
        &self,
        instance: impl Into<Option<&'a Instance>>,
    ) -> KeyBoxResult<Option<Arc<KeyRing>>> {
        let instance = instance.into().ok_or(KeyBoxError::NullInstance)?;
        self.inner.ring_for_instance(instance)
    }

    /// Returns a new instance-less key ring for `type_name`.
    ///
    /// Abstract classes and interfaces use the schema shared by their
    /// declared implementors.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyBoxError::UnknownType`] or
    /// [`KeyBoxError::AmbiguousSchema`].
    pub fn key_ring_for_type(&self, type_name: &str) -> KeyBoxResult<Option<Arc<KeyRing>>> {
        Ok(self
            .inner
            .resolve(type_name)?
            .map(|schema| KeyRing::unbound(schema, type_name, Arc::downgrade(&self.inner))))
    }

    /// Whether a schema applies to `type_name`.
    pub fn has_mapped_keys(&self, type_name: &str) -> bool {
        matches!(self.inner.resolve(type_name), Ok(Some(_)))
    }

    /// Number of attachments whose instance and ring are still alive.
    pub fn attached_count(&self) -> usize {
        self.inner
            .shards
            .iter()
            .map(|shard| {
                shard
                    .lock()
                    .values()
                    .filter(|attachment| attachment.live_ring().is_some())
                    .count()
            })
            .sum()
    }

    /// Drops attachments of released instances; returns how many were removed.
    pub fn purge(&self) -> usize {
        self.inner.purge()
    }

    /// Type id of a declared type.
    pub fn type_id_of(&self, type_name: &str) -> Option<u32> {
        self.inner.schemas.type_id_of(type_name)
    }

    /// Declared type with the given id.
    pub fn type_by_id(&self, type_id: u32) -> Option<&str> {
        self.inner.schemas.type_by_id(type_id)
    }
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("types", &self.inner.schemas.len())
            .field("shards", &self.inner.shards.len())
            .finish_non_exhaustive()
    }
}
