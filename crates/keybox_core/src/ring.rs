//! Key rings: per-instance accessors over a compiled key schema.
//!
//! A ring is either bound to a source instance, in which case derived parts
//! read and write through the instance's object graph, or instance-less, in
//! which case derived values are staged in the ring until a source is
//! instantiated. Literal parts always live in the ring's own slots.

use crate::error::{KeyBoxError, KeyBoxResult};
use crate::identity::RegistryInner;
use crate::model::{Entity, Field, Instance, PropertyType};
use crate::schema::{KeyDefinition, PathStep, Schema};
use crate::values::KeyValues;
use keybox_codec::{Value, ValueType};
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

enum Source {
    Unbound,
    /// Attached to an instance owned elsewhere.
    Bound(Weak<dyn Entity>),
    /// Created by this ring and not handed out yet.
    Owned(Instance),
}

impl Source {
    fn live(&self) -> Option<Option<Instance>> {
        match self {
            Source::Unbound => Some(None),
            Source::Bound(source) => source.upgrade().map(Some),
            Source::Owned(source) => Some(Some(Arc::clone(source))),
        }
    }
}

struct RingState {
    slots: Vec<Value>,
    /// Derived values written before a source exists, by part index.
    staged: Vec<Value>,
    source: Source,
}

enum Location {
    Staged(Value),
    Source(Instance),
}

/// Accessor for the key of one instance (or of one instance to be).
pub struct KeyRing {
    schema: Arc<Schema>,
    type_name: String,
    state: Mutex<RingState>,
    instantiate: Mutex<()>,
    registry: Weak<RegistryInner>,
    this: Weak<KeyRing>,
}

impl KeyRing {
    pub(crate) fn bound(
        schema: Arc<Schema>,
        instance: &Instance,
        registry: Weak<RegistryInner>,
    ) -> Arc<Self> {
        let type_name = instance.type_name().to_string();
        Self::build(schema, type_name, Source::Bound(Arc::downgrade(instance)), registry)
    }

    pub(crate) fn unbound(
        schema: Arc<Schema>,
        type_name: &str,
        registry: Weak<RegistryInner>,
    ) -> Arc<Self> {
        Self::build(schema, type_name.to_string(), Source::Unbound, registry)
    }

    fn build(
        schema: Arc<Schema>,
        type_name: String,
        source: Source,
        registry: Weak<RegistryInner>,
    ) -> Arc<Self> {
        let staged = match source {
            Source::Unbound => vec![Value::Null; schema.len()],
            Source::Bound(_) | Source::Owned(_) => Vec::new(),
        };
        let slots = vec![Value::Null; schema.literal_count()];
        Arc::new_cyclic(|this| Self {
            schema,
            type_name,
            state: Mutex::new(RingState {
                slots,
                staged,
                source,
            }),
            instantiate: Mutex::new(()),
            registry,
            this: this.clone(),
        })
    }

    /// The type the ring was created for.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The schema the ring accesses.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Number of key parts.
    pub fn part_count(&self) -> usize {
        self.schema.len()
    }

    /// Part names in canonical order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.schema.names()
    }

    /// Declared value type of the part at `index`.
    pub fn part_type(&self, index: usize) -> KeyBoxResult<ValueType> {
        self.check_index(index)?;
        Ok(self.schema.parts()[index].definition().value_type())
    }

    /// Whether the ring has a source instance (live or released).
    pub fn is_bound(&self) -> bool {
        !matches!(self.state.lock().source, Source::Unbound)
    }

    /// The live source instance, if bound and still alive.
    ///
    /// Returning a source this ring created hands it to the caller: from
    /// then on the registry keeps the ring for as long as the instance
    /// lives, and the ring stops keeping the instance alive.
    pub fn source(&self) -> Option<Instance> {
        let source = self.state.lock().source.live().flatten()?;
        self.hand_out(&source);
        Some(source)
    }

    /// Reads a part by name.
    ///
    /// # Errors
    ///
    /// Fails for unknown parts, released sources or registries, and errors
    /// raised while navigating or materializing the path.
    pub fn get(&self, name: &str) -> KeyBoxResult<Value> {
        let index = self.index_of(name)?;
        self.read(index, true)
    }

    /// Writes a part by name.
    ///
    /// # Errors
    ///
    /// Fails for unknown parts, values the part's type does not accept, and
    /// errors raised while navigating or instantiating.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> KeyBoxResult<&Self> {
        let index = self.index_of(name)?;
        self.write(index, value.into())?;
        Ok(self)
    }

    /// Reads a part by canonical index.
    ///
    /// # Errors
    ///
    /// As [`get`](Self::get), plus [`KeyBoxError::PartIndexOutOfRange`].
    pub fn get_at(&self, index: usize) -> KeyBoxResult<Value> {
        self.check_index(index)?;
        self.read(index, true)
    }

    /// Writes a part by canonical index.
    ///
    /// # Errors
    ///
    /// As [`set`](Self::set), plus [`KeyBoxError::PartIndexOutOfRange`].
    pub fn set_at(&self, index: usize, value: impl Into<Value>) -> KeyBoxResult<&Self> {
        self.check_index(index)?;
        self.write(index, value.into())?;
        Ok(self)
    }

    /// Whether every part currently has a non-null value.
    ///
    /// Derived parts are inspected without materializing missing objects; a
    /// part that cannot be read counts as missing.
    pub fn is_completed(&self) -> bool {
        (0..self.part_count()).all(|index| matches!(self.read(index, false), Ok(v) if !v.is_null()))
    }

    /// Part values in canonical order, recomputed on each call.
    pub fn values(&self) -> Values<'_> {
        Values {
            ring: self,
            index: 0,
        }
    }

    /// `(name, value)` pairs in canonical order, recomputed on each call.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            ring: self,
            index: 0,
        }
    }

    /// A snapshot of all part values.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while reading a part.
    pub fn key_values(&self) -> KeyBoxResult<KeyValues> {
        self.values().collect()
    }

    /// Creates the source of an instance-less ring, or returns the bound one.
    ///
    /// The new instance receives every staged derived value and the ring is
    /// attached to it in the registry. The instance is handed to the caller
    /// as by [`source`](Self::source). On failure the ring stays
    /// instance-less with its staged values intact.
    ///
    /// # Errors
    ///
    /// Fails if the source was released, the registry is gone, the factory
    /// fails or creates a type that does not use this ring's schema, a
    /// staged value cannot be written, or the new instance already has a
    /// ring.
    pub fn instantiate_source(&self) -> KeyBoxResult<Instance> {
        let source = self.instantiate()?;
        self.hand_out(&source);
        Ok(source)
    }

    fn instantiate(&self) -> KeyBoxResult<Instance> {
        if let Some(source) = self.bound_source()? {
            return Ok(source);
        }
        let _guard = self.instantiate.lock();
        if let Some(source) = self.bound_source()? {
            return Ok(source);
        }

        let registry = self.registry()?;
        let instance = registry.factory().create(&self.type_name)?;
        let same_schema = registry
            .resolve(instance.type_name())?
            .is_some_and(|schema| Arc::ptr_eq(&schema, &self.schema));
        if !same_schema {
            return Err(KeyBoxError::SourceSchemaMismatch {
                type_name: self.type_name.clone(),
                created: instance.type_name().to_string(),
            });
        }

        let staged = self.state.lock().staged.clone();
        for (index, value) in staged.iter().enumerate() {
            if !value.is_null() {
                self.write_through(&instance, index, value.clone())?;
            }
        }

        let this = self.this.upgrade().ok_or_else(|| self.released())?;
        let attached = registry.attach(&instance, &this, true);
        if !Arc::ptr_eq(&attached, &this) {
            return Err(KeyBoxError::AlreadyAttached {
                type_name: self.type_name.clone(),
            });
        }

        let late = {
            let mut state = self.state.lock();
            state.source = Source::Owned(Arc::clone(&instance));
            std::mem::take(&mut state.staged)
        };
        // Values staged while the source was being built.
        for (index, (value, written)) in late.into_iter().zip(staged).enumerate() {
            if value != written {
                self.write_through(&instance, index, value)?;
            }
        }

        debug!(type_name = %self.type_name, "instantiated key ring source");
        Ok(instance)
    }

    fn hand_out(&self, source: &Instance) {
        {
            let mut state = self.state.lock();
            if !matches!(state.source, Source::Owned(_)) {
                return;
            }
            state.source = Source::Bound(Arc::downgrade(source));
        }
        if let (Ok(registry), Some(this)) = (self.registry(), self.this.upgrade()) {
            registry.promote(source, &this);
        }
    }

    fn index_of(&self, name: &str) -> KeyBoxResult<usize> {
        self.schema.index_of(name).ok_or_else(|| KeyBoxError::UnknownPart {
            type_name: self.type_name.clone(),
            part: name.to_string(),
        })
    }

    fn check_index(&self, index: usize) -> KeyBoxResult<()> {
        if index < self.part_count() {
            Ok(())
        } else {
            Err(KeyBoxError::PartIndexOutOfRange {
                index,
                count: self.part_count(),
            })
        }
    }

    fn registry(&self) -> KeyBoxResult<Arc<RegistryInner>> {
        self.registry.upgrade().ok_or(KeyBoxError::RegistryReleased)
    }

    fn bound_source(&self) -> KeyBoxResult<Option<Instance>> {
        self.state.lock().source.live().ok_or_else(|| self.released())
    }

    fn released(&self) -> KeyBoxError {
        KeyBoxError::SourceReleased {
            type_name: self.type_name.clone(),
        }
    }

    fn locate(&self, index: usize) -> KeyBoxResult<Location> {
        let state = self.state.lock();
        match state.source.live() {
            Some(None) => Ok(Location::Staged(
                state.staged.get(index).cloned().unwrap_or_default(),
            )),
            Some(Some(source)) => Ok(Location::Source(source)),
            None => Err(self.released()),
        }
    }

    fn read(&self, index: usize, materialize: bool) -> KeyBoxResult<Value> {
        match self.schema.parts()[index].definition() {
            KeyDefinition::Literal { slot, .. } => Ok(self.state.lock().slots[*slot].clone()),
            definition => match self.locate(index)? {
                Location::Staged(value) => Ok(value),
                Location::Source(source) => self.read_derived(&source, definition, materialize),
            },
        }
    }

    fn read_derived(
        &self,
        source: &Instance,
        definition: &KeyDefinition,
        materialize: bool,
    ) -> KeyBoxResult<Value> {
        match definition {
            KeyDefinition::Literal { .. } => Ok(Value::Null),
            KeyDefinition::ByPath { path, .. } => {
                let Some(owner) = self.navigate(source, path.hops(), materialize)? else {
                    return Ok(Value::Null);
                };
                read_value(&owner, path.leaf())
            }
            KeyDefinition::ByForeignKey {
                path, foreign_part, ..
            } => {
                let Some(related) = self.navigate(source, path.steps(), materialize)? else {
                    return Ok(Value::Null);
                };
                let ring = self.related_ring(&related)?;
                let index = ring.index_of(foreign_part)?;
                ring.read(index, materialize)
            }
        }
    }

    fn write(&self, index: usize, value: Value) -> KeyBoxResult<()> {
        let definition = self.schema.parts()[index].definition();
        let expected = definition.value_type();
        if !expected.accepts(&value) {
            return Err(KeyBoxError::PartTypeMismatch {
                part: self.schema.parts()[index].name().to_string(),
                expected,
                actual: value.kind(),
            });
        }

        let mut state = self.state.lock();
        let unbound = matches!(state.source, Source::Unbound);
        if let KeyDefinition::Literal { slot, .. } = definition {
            state.slots[*slot] = value;
            drop(state);
        } else if unbound {
            state.staged[index] = value;
            drop(state);
        } else {
            let source = state.source.live().flatten();
            drop(state);
            let source = source.ok_or_else(|| self.released())?;
            self.write_through(&source, index, value)?;
        }

        if unbound && self.is_completed() {
            let registry = self.registry()?;
            if registry.config().instantiate_on_complete {
                self.instantiate()?;
            }
        }
        Ok(())
    }

    fn write_through(&self, source: &Instance, index: usize, value: Value) -> KeyBoxResult<()> {
        match self.schema.parts()[index].definition() {
            KeyDefinition::Literal { slot, .. } => {
                self.state.lock().slots[*slot] = value;
                Ok(())
            }
            KeyDefinition::ByPath { path, .. } => {
                let owner = self
                    .navigate(source, path.hops(), true)?
                    .ok_or_else(|| self.mismatch(source, path.leaf()))?;
                let leaf = path.leaf();
                if owner.set_field(leaf.property(), Field::Value(value)) {
                    Ok(())
                } else {
                    Err(self.mismatch(&owner, leaf))
                }
            }
            KeyDefinition::ByForeignKey {
                path, foreign_part, ..
            } => {
                let related = self
                    .navigate(source, path.steps(), true)?
                    .ok_or_else(|| self.mismatch(source, path.leaf()))?;
                let ring = self.related_ring(&related)?;
                ring.set(foreign_part, value)?;
                Ok(())
            }
        }
    }

    /// Follows object steps from `start`. Missing objects are created and
    /// written back into their parent when `materialize` is set; otherwise a
    /// missing object ends the walk with `None`.
    fn navigate(
        &self,
        start: &Instance,
        steps: &[PathStep],
        materialize: bool,
    ) -> KeyBoxResult<Option<Instance>> {
        let mut current = Arc::clone(start);
        for step in steps {
            let PropertyType::Object(target) = step.ty() else {
                return Err(self.mismatch(&current, step));
            };
            let next = match current.field(step.property()) {
                Some(Field::Object(Some(next))) => next,
                Some(Field::Object(None)) if materialize => {
                    let created = self.registry()?.factory().create(target)?;
                    if !current.set_field(step.property(), Field::Object(Some(Arc::clone(&created)))) {
                        return Err(self.mismatch(&current, step));
                    }
                    trace!(
                        parent = current.type_name(),
                        segment = step.segment(),
                        created = created.type_name(),
                        "materialized path object"
                    );
                    created
                }
                Some(Field::Object(None)) => return Ok(None),
                _ => return Err(self.mismatch(&current, step)),
            };
            current = next;
        }
        Ok(Some(current))
    }

    fn related_ring(&self, related: &Instance) -> KeyBoxResult<Arc<KeyRing>> {
        self.registry()?
            .ring_for_instance(related)?
            .ok_or_else(|| KeyBoxError::NoSchema {
                type_name: related.type_name().to_string(),
            })
    }

    fn mismatch(&self, entity: &Instance, step: &PathStep) -> KeyBoxError {
        KeyBoxError::PathMismatch {
            type_name: entity.type_name().to_string(),
            segment: step.segment().to_string(),
        }
    }
}

fn read_value(owner: &Instance, leaf: &PathStep) -> KeyBoxResult<Value> {
    match owner.field(leaf.property()) {
        Some(Field::Value(value)) => Ok(value),
        _ => Err(KeyBoxError::PathMismatch {
            type_name: owner.type_name().to_string(),
            segment: leaf.segment().to_string(),
        }),
    }
}

impl PartialEq for KeyRing {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.part_count() != other.part_count() {
            return false;
        }
        match (self.key_values(), other.key_values()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for KeyRing {}

impl Hash for KeyRing {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.key_values() {
            Ok(values) => values.hash(state),
            Err(_) => KeyValues::default().hash(state),
        }
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("KeyRing")
            .field("type_name", &self.type_name)
            .field("owner", &self.schema.owner())
            .field("parts", &self.schema.names().collect::<Vec<_>>())
            .field("slots", &state.slots)
            .field("bound", &!matches!(state.source, Source::Unbound))
            .finish()
    }
}

/// Iterator over a ring's part values.
#[derive(Debug)]
pub struct Values<'a> {
    ring: &'a KeyRing,
    index: usize,
}

impl Iterator for Values<'_> {
    type Item = KeyBoxResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.ring.part_count() {
            return None;
        }
        let value = self.ring.read(self.index, true);
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ring.part_count().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Values<'_> {}

/// Iterator over a ring's `(name, value)` pairs.
#[derive(Debug)]
pub struct Entries<'a> {
    ring: &'a KeyRing,
    index: usize,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a str, KeyBoxResult<Value>);

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.ring.schema.parts().get(self.index)?;
        let value = self.ring.read(self.index, true);
        self.index += 1;
        Some((part.name(), value))
    }
}
