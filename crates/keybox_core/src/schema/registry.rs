//! Schema registry: declaration, alias resolution and commit.
//!
//! The registry starts out [`Building`](RegistryState::Building). Key shapes
//! are declared per type, either directly or as an alias of another type's
//! shape. [`SchemaRegistry::commit`] resolves aliases, validates foreign keys
//! and freezes everything into an immutable [`SchemaSet`].

use crate::error::{ForeignKeyIssue, KeyBoxError, KeyBoxResult};
use crate::model::{TypeCatalog, TypeInfo, TypeKind};
use crate::schema::definition::{KeyDefinition, KeyPart, KeySpec, PropertyPath, Schema};
use crate::schema::path::{compile_path, CompiledPath};
use keybox_codec::ValueType;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Lifecycle of a [`SchemaRegistry`].
#[derive(Debug, Clone)]
pub enum RegistryState {
    /// Declarations are accepted.
    Building,
    /// Frozen; holds the committed schemas.
    Committed(Arc<SchemaSet>),
}

#[derive(Debug, Clone)]
enum DraftKind {
    Ready(KeyDefinition),
    ForeignKey {
        index: usize,
        path: PropertyPath,
        foreign_part: String,
    },
}

#[derive(Debug, Clone)]
struct DraftPart {
    name: String,
    kind: DraftKind,
}

#[derive(Debug, Clone)]
struct Draft {
    parts: Vec<DraftPart>,
}

impl Draft {
    fn part(&self, name: &str) -> Option<&DraftPart> {
        self.parts.iter().find(|p| p.name == name)
    }
}

/// Collects key declarations until commit.
#[derive(Debug)]
pub struct SchemaRegistry {
    catalog: Arc<TypeCatalog>,
    drafts: HashMap<String, Draft>,
    aliases: HashMap<String, String>,
    declared: Vec<String>,
    state: RegistryState,
}

impl SchemaRegistry {
    /// Creates an empty registry over a type catalog.
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            drafts: HashMap::new(),
            aliases: HashMap::new(),
            declared: Vec::new(),
            state: RegistryState::Building,
        }
    }

    /// The type catalog declarations are checked against.
    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Current state.
    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    /// Whether [`commit`](Self::commit) has succeeded.
    pub fn is_committed(&self) -> bool {
        matches!(self.state, RegistryState::Committed(_))
    }

    /// The committed schemas, once committed.
    pub fn schemas(&self) -> Option<&Arc<SchemaSet>> {
        match &self.state {
            RegistryState::Committed(set) => Some(set),
            RegistryState::Building => None,
        }
    }

    /// Declared types in declaration order; a type's position is its type id.
    pub fn declared_types(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(String::as_str)
    }

    /// Declares the key shape of `type_name`.
    ///
    /// Part indices are assigned by sorting the part names.
    ///
    /// # Errors
    ///
    /// Fails if the registry is committed, the type is unknown, not a class,
    /// or already declared, a part name repeats, or a path does not compile.
    pub fn declare_key<I, N, S>(&mut self, type_name: &str, parts: I) -> KeyBoxResult<&mut Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<KeySpec>,
    {
        self.check_declarable(type_name)?;

        let mut specs = BTreeMap::new();
        for (name, spec) in parts {
            let name = name.into();
            if specs.contains_key(&name) {
                return Err(KeyBoxError::DuplicatePart {
                    type_name: type_name.to_string(),
                    part: name,
                });
            }
            specs.insert(name, spec.into());
        }

        let mut draft = Draft {
            parts: Vec::with_capacity(specs.len()),
        };
        let mut slot = 0;
        for (index, (name, spec)) in specs.into_iter().enumerate() {
            let kind = match spec {
                KeySpec::Literal(value_type) => {
                    slot += 1;
                    DraftKind::Ready(KeyDefinition::Literal {
                        index,
                        slot: slot - 1,
                        value_type,
                    })
                }
                KeySpec::Path(raw) => match compile_path(&self.catalog, type_name, &name, &raw)? {
                    CompiledPath::Field { path, value_type } => DraftKind::Ready(KeyDefinition::ByPath {
                        index,
                        path,
                        value_type,
                    }),
                    CompiledPath::ForeignKey { path, foreign_part } => DraftKind::ForeignKey {
                        index,
                        path,
                        foreign_part,
                    },
                },
            };
            draft.parts.push(DraftPart { name, kind });
        }

        debug!(type_name, parts = draft.parts.len(), "declared key");
        self.drafts.insert(type_name.to_string(), draft);
        self.declared.push(type_name.to_string());
        Ok(self)
    }

    /// Declares that `type_name` reuses the whole key shape of `example`.
    ///
    /// The example may be declared later, as long as it is declared before
    /// [`commit`](Self::commit).
    ///
    /// # Errors
    ///
    /// Fails if the registry is committed, either type is unknown or not a
    /// class, or `type_name` is already declared.
    pub fn declare_key_alias(&mut self, type_name: &str, example: &str) -> KeyBoxResult<&mut Self> {
        self.check_declarable(type_name)?;
        check_class(self.catalog.require(example)?)?;

        debug!(type_name, example, "declared key alias");
        self.aliases.insert(type_name.to_string(), example.to_string());
        self.declared.push(type_name.to_string());
        Ok(self)
    }

    /// Resolves aliases, validates foreign keys and freezes the registry.
    ///
    /// On failure the registry stays in the building state.
    ///
    /// # Errors
    ///
    /// Returns [`KeyBoxError::AlreadyConfigured`] on a second commit,
    /// [`KeyBoxError::ExampleLoopDetected`] for an alias cycle,
    /// [`KeyBoxError::KeysNotMapped`] for alias chains ending in an
    /// undeclared type, [`KeyBoxError::InvalidForeignKeyPath`] for foreign
    /// keys whose target part does not exist, and
    /// [`KeyBoxError::ForeignKeyLoop`] for a foreign key chain that never
    /// reaches a concrete part.
    pub fn commit(&mut self) -> KeyBoxResult<Arc<SchemaSet>> {
        if self.is_committed() {
            return Err(KeyBoxError::AlreadyConfigured);
        }

        let owners = self.resolve_aliases()?;
        self.check_alias_layouts(&owners)?;
        let foreign_types = self.validate_foreign_keys(&owners)?;

        let mut built: HashMap<&str, Arc<Schema>> = HashMap::with_capacity(self.drafts.len());
        for (owner, draft) in &self.drafts {
            let parts = draft
                .parts
                .iter()
                .map(|part| {
                    let definition = match &part.kind {
                        DraftKind::Ready(definition) => definition.clone(),
                        DraftKind::ForeignKey {
                            index,
                            path,
                            foreign_part,
                        } => KeyDefinition::ByForeignKey {
                            index: *index,
                            path: path.clone(),
                            foreign_part: foreign_part.clone(),
                            value_type: foreign_types
                                .get(&(owner.clone(), part.name.clone()))
                                .copied()
                                .unwrap_or(ValueType::Any),
                        },
                    };
                    KeyPart::new(part.name.clone(), definition)
                })
                .collect();
            built.insert(owner.as_str(), Arc::new(Schema::new(owner.clone(), parts)));
        }

        let mut schemas = HashMap::with_capacity(self.declared.len());
        let mut ids = HashMap::with_capacity(self.declared.len());
        for (id, type_name) in self.declared.iter().enumerate() {
            if let Some(schema) = owners.get(type_name).and_then(|o| built.get(o.as_str())) {
                schemas.insert(type_name.clone(), Arc::clone(schema));
            }
            ids.insert(type_name.clone(), u32::try_from(id).unwrap_or(u32::MAX));
        }

        let set = Arc::new(SchemaSet {
            catalog: Arc::clone(&self.catalog),
            declared: self.declared.clone(),
            ids,
            schemas,
        });
        debug!(
            types = set.declared.len(),
            schemas = self.drafts.len(),
            aliases = self.aliases.len(),
            "committed key schemas"
        );
        self.state = RegistryState::Committed(Arc::clone(&set));
        Ok(set)
    }

    fn check_declarable(&self, type_name: &str) -> KeyBoxResult<()> {
        if self.is_committed() {
            return Err(KeyBoxError::AlreadyConfigured);
        }
        check_class(self.catalog.require(type_name)?)?;
        if self.drafts.contains_key(type_name) || self.aliases.contains_key(type_name) {
            return Err(KeyBoxError::AlreadyMapped {
                type_name: type_name.to_string(),
            });
        }
        Ok(())
    }

    /// Maps every declared type to the type whose declaration it uses.
    fn resolve_aliases(&self) -> KeyBoxResult<HashMap<String, String>> {
        let mut owners: HashMap<String, String> =
            self.drafts.keys().map(|t| (t.clone(), t.clone())).collect();
        let mut pending: HashSet<&str> = self.aliases.keys().map(String::as_str).collect();
        let mut queue = self
            .declared
            .iter()
            .map(String::as_str)
            .filter(|t| self.aliases.contains_key(*t));
        let mut unmapped: Vec<String> = Vec::new();
        let mut stack: Vec<&str> = Vec::new();

        while !pending.is_empty() {
            if stack.is_empty() {
                match queue.find(|t| pending.contains(t)) {
                    Some(next) => stack.push(next),
                    None => break,
                }
            }
            let Some(&top) = stack.last() else {
                break;
            };

            if let Some(owner) = owners.get(top).cloned() {
                while let Some(resolved) = stack.pop() {
                    pending.remove(resolved);
                    owners.insert(resolved.to_string(), owner.clone());
                }
            } else if let Some(example) = self.aliases.get(top).filter(|_| pending.contains(top)) {
                if stack.contains(&example.as_str()) {
                    return Err(KeyBoxError::ExampleLoopDetected {
                        type_name: example.clone(),
                    });
                }
                stack.push(example.as_str());
            } else {
                while let Some(missing) = stack.pop() {
                    pending.remove(missing);
                    unmapped.push(missing.to_string());
                }
            }
        }

        if !unmapped.is_empty() {
            unmapped.sort();
            unmapped.dedup();
            return Err(KeyBoxError::KeysNotMapped { types: unmapped });
        }
        Ok(owners)
    }

    /// Compiled paths address fields by index, so an alias must expose the
    /// first property of every path at the same index as its example.
    fn check_alias_layouts(&self, owners: &HashMap<String, String>) -> KeyBoxResult<()> {
        for alias in self.declared.iter().filter(|t| self.aliases.contains_key(*t)) {
            let Some(draft) = owners.get(alias).and_then(|owner| self.drafts.get(owner)) else {
                continue;
            };
            let info = self.catalog.require(alias)?;
            for part in &draft.parts {
                let path = match &part.kind {
                    DraftKind::Ready(definition) => definition.path(),
                    DraftKind::ForeignKey { path, .. } => Some(path),
                };
                let Some(first) = path.and_then(|p| p.steps().first()) else {
                    continue;
                };
                match info.property(first.segment()) {
                    Some((index, property)) if index == first.property() && property.ty == *first.ty() => {
                        if property.nullable {
                            return Err(KeyBoxError::NullablePathSegment {
                                type_name: alias.clone(),
                                part: part.name.clone(),
                                segment: first.segment().to_string(),
                            });
                        }
                    }
                    _ => {
                        return Err(KeyBoxError::InvalidPathSegment {
                            type_name: alias.clone(),
                            part: part.name.clone(),
                            segment: first.segment().to_string(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks every foreign key and resolves the value type of each.
    fn validate_foreign_keys(
        &self,
        owners: &HashMap<String, String>,
    ) -> KeyBoxResult<HashMap<(String, String), ValueType>> {
        let owner_of = |t: &str| owners.get(t).map(String::as_str);
        let mut issues = Vec::new();
        let mut links: HashMap<(String, String), (String, String)> = HashMap::new();

        for owner in self.declared.iter().filter(|t| self.drafts.contains_key(*t)) {
            let Some(draft) = self.drafts.get(owner) else {
                continue;
            };
            for part in &draft.parts {
                let DraftKind::ForeignKey {
                    path, foreign_part, ..
                } = &part.kind
                else {
                    continue;
                };
                let related = path.related_type().unwrap_or_default();
                let target = resolve_owner(&self.catalog, &self.declared, owner_of, related)?
                    .filter(|t| self.drafts.get(*t).and_then(|d| d.part(foreign_part)).is_some());
                match target {
                    Some(target) => {
                        links.insert(
                            (owner.clone(), part.name.clone()),
                            (target.to_string(), foreign_part.clone()),
                        );
                    }
                    None => issues.push(ForeignKeyIssue {
                        type_name: owner.clone(),
                        part: part.name.clone(),
                        related_type: related.to_string(),
                        missing_part: foreign_part.clone(),
                    }),
                }
            }
        }

        if !issues.is_empty() {
            return Err(KeyBoxError::InvalidForeignKeyPath { issues });
        }

        let mut resolved: HashMap<(String, String), ValueType> = HashMap::with_capacity(links.len());
        for start in links.keys() {
            if resolved.contains_key(start) {
                continue;
            }
            let mut chain = Vec::new();
            let mut current = start.clone();
            let value_type = loop {
                if let Some(value_type) = resolved.get(&current) {
                    break *value_type;
                }
                if let Some(next) = links.get(&current) {
                    if chain.contains(&current) {
                        return Err(KeyBoxError::ForeignKeyLoop {
                            type_name: start.0.clone(),
                            part: start.1.clone(),
                        });
                    }
                    chain.push(current);
                    current = next.clone();
                    continue;
                }
                let value_type = self
                    .drafts
                    .get(&current.0)
                    .and_then(|d| d.part(&current.1))
                    .and_then(|p| match &p.kind {
                        DraftKind::Ready(definition) => Some(definition.value_type()),
                        DraftKind::ForeignKey { .. } => None,
                    })
                    .unwrap_or(ValueType::Any);
                break value_type;
            };
            for link in chain {
                resolved.insert(link, value_type);
            }
        }
        Ok(resolved)
    }
}

fn check_class(info: &TypeInfo) -> KeyBoxResult<()> {
    if info.kind().is_class() {
        Ok(())
    } else {
        Err(KeyBoxError::NotAClass {
            type_name: info.name().to_string(),
        })
    }
}

/// Finds the declaration that applies to `type_name`: the type itself or its
/// nearest base, else, for abstract classes and interfaces, the single
/// declaration among implementors.
pub(crate) fn resolve_owner<'a>(
    catalog: &TypeCatalog,
    declared: &[String],
    owner_of: impl Fn(&str) -> Option<&'a str>,
    type_name: &str,
) -> KeyBoxResult<Option<&'a str>> {
    let info = catalog.require(type_name)?;
    if let Some(owner) = info.ancestry().find_map(&owner_of) {
        return Ok(Some(owner));
    }
    if !matches!(info.kind(), TypeKind::Abstract | TypeKind::Interface) {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    let mut distinct: Vec<&'a str> = Vec::new();
    for declared_type in declared {
        let Some(owner) = owner_of(declared_type) else {
            continue;
        };
        let implements = catalog
            .get(declared_type)
            .is_some_and(|candidate| candidate.is_subtype_of(type_name));
        if implements {
            candidates.push(declared_type.clone());
            if !distinct.contains(&owner) {
                distinct.push(owner);
            }
        }
    }

    match distinct.as_slice() {
        [] => Ok(None),
        [owner] => Ok(Some(*owner)),
        _ => Err(KeyBoxError::AmbiguousSchema {
            type_name: type_name.to_string(),
            candidates,
        }),
    }
}

/// Committed, immutable key schemas.
#[derive(Debug)]
pub struct SchemaSet {
    catalog: Arc<TypeCatalog>,
    declared: Vec<String>,
    ids: HashMap<String, u32>,
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaSet {
    /// The type catalog the schemas were compiled against.
    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Schema declared for exactly `type_name` (directly or by alias).
    pub fn schema_of(&self, type_name: &str) -> Option<&Arc<Schema>> {
        self.schemas.get(type_name)
    }

    /// Type id of a declared type.
    pub fn type_id_of(&self, type_name: &str) -> Option<u32> {
        self.ids.get(type_name).copied()
    }

    /// Declared type with the given id.
    pub fn type_by_id(&self, type_id: u32) -> Option<&str> {
        usize::try_from(type_id)
            .ok()
            .and_then(|id| self.declared.get(id))
            .map(String::as_str)
    }

    /// Declared types in id order.
    pub fn declared_types(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(String::as_str)
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.declared.len()
    }

    /// Whether nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    /// The nearest declared type in the ancestry of `type_name` that has an
    /// id; this is the id used on the wire for its instances.
    pub fn declared_ancestor(&self, type_name: &str) -> Option<&str> {
        let info = self.catalog.get(type_name)?;
        info.ancestry()
            .find(|t| self.ids.contains_key(*t))
            .and_then(|t| self.ids.get_key_value(t))
            .map(|(name, _)| name.as_str())
    }

    /// Resolves the schema that applies to `type_name`.
    ///
    /// Exact declarations win, then the nearest base class. For abstract
    /// classes and interfaces, the schema of the implementing declarations is
    /// used when they all share one.
    ///
    /// # Errors
    ///
    /// Fails with [`KeyBoxError::UnknownType`] for unknown types and
    /// [`KeyBoxError::AmbiguousSchema`] when implementors disagree.
    pub fn resolve(&self, type_name: &str) -> KeyBoxResult<Option<Arc<Schema>>> {
        let owner = resolve_owner(
            &self.catalog,
            &self.declared,
            |t| self.schemas.get(t).map(|s| s.owner()),
            type_name,
        )?;
        Ok(owner.and_then(|o| self.schemas.get(o)).cloned())
    }
}
