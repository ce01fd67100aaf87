//! Key parts and the compiled schema of one type.

use crate::model::PropertyType;
use keybox_codec::ValueType;
use std::collections::HashMap;
use std::fmt;

/// How a key part is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    /// A value stored in the key ring itself.
    Literal(ValueType),
    /// A `/`-separated property path rooted at the key's type.
    Path(String),
}

impl From<ValueType> for KeySpec {
    fn from(ty: ValueType) -> Self {
        KeySpec::Literal(ty)
    }
}

impl From<&str> for KeySpec {
    fn from(path: &str) -> Self {
        KeySpec::Path(path.to_string())
    }
}

impl From<String> for KeySpec {
    fn from(path: String) -> Self {
        KeySpec::Path(path)
    }
}

/// One resolved step of a property path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub(crate) segment: String,
    pub(crate) property: usize,
    pub(crate) ty: PropertyType,
}

impl PathStep {
    /// Property name.
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Index of the property in the owning type's flattened table.
    pub fn property(&self) -> usize {
        self.property
    }

    /// Declared type of the property.
    pub fn ty(&self) -> &PropertyType {
        &self.ty
    }
}

/// A compiled property path.
///
/// Every step but the last crosses an object property. For a field part the
/// last step is the value property; for a foreign-key part it is the relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    steps: Vec<PathStep>,
}

impl PropertyPath {
    pub(crate) fn new(steps: Vec<PathStep>) -> Self {
        debug_assert!(!steps.is_empty());
        Self { steps }
    }

    /// All steps.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// The object steps before the leaf.
    pub fn hops(&self) -> &[PathStep] {
        &self.steps[..self.steps.len() - 1]
    }

    /// The last step.
    pub fn leaf(&self) -> &PathStep {
        &self.steps[self.steps.len() - 1]
    }

    /// The object type the leaf points at, if the leaf is a relation.
    pub fn related_type(&self) -> Option<&str> {
        match &self.leaf().ty {
            PropertyType::Object(name) => Some(name),
            PropertyType::Value(_) => None,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "/{}", step.segment)?;
        }
        Ok(())
    }
}

/// How a key part gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDefinition {
    /// Stored in the ring at `slot`.
    Literal {
        /// Canonical part index.
        index: usize,
        /// Literal slot.
        slot: usize,
        /// Declared value type.
        value_type: ValueType,
    },
    /// Read from a value property of the source object graph.
    ByPath {
        /// Canonical part index.
        index: usize,
        /// Path to the value property.
        path: PropertyPath,
        /// Type of the leaf property.
        value_type: ValueType,
    },
    /// Delegated to a part of the related object's key.
    ByForeignKey {
        /// Canonical part index.
        index: usize,
        /// Path to the related object.
        path: PropertyPath,
        /// Part of the related key this part reads.
        foreign_part: String,
        /// Type of the foreign part, resolved at commit.
        value_type: ValueType,
    },
}

impl KeyDefinition {
    /// Canonical part index.
    pub fn index(&self) -> usize {
        match self {
            KeyDefinition::Literal { index, .. }
            | KeyDefinition::ByPath { index, .. }
            | KeyDefinition::ByForeignKey { index, .. } => *index,
        }
    }

    /// Value type of the part.
    pub fn value_type(&self) -> ValueType {
        match self {
            KeyDefinition::Literal { value_type, .. }
            | KeyDefinition::ByPath { value_type, .. }
            | KeyDefinition::ByForeignKey { value_type, .. } => *value_type,
        }
    }

    /// Whether the value lives in the ring.
    pub fn is_literal(&self) -> bool {
        matches!(self, KeyDefinition::Literal { .. })
    }

    /// Path of a derived part.
    pub fn path(&self) -> Option<&PropertyPath> {
        match self {
            KeyDefinition::Literal { .. } => None,
            KeyDefinition::ByPath { path, .. } | KeyDefinition::ByForeignKey { path, .. } => {
                Some(path)
            }
        }
    }
}

/// A named key part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPart {
    name: String,
    definition: KeyDefinition,
}

impl KeyPart {
    pub(crate) fn new(name: String, definition: KeyDefinition) -> Self {
        Self { name, definition }
    }

    /// Part name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Part definition.
    pub fn definition(&self) -> &KeyDefinition {
        &self.definition
    }
}

/// The compiled key schema of one declared type.
///
/// Parts are ordered by name; a part's position is its canonical index.
/// Types declared by alias share their example's schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    owner: String,
    parts: Vec<KeyPart>,
    by_name: HashMap<String, usize>,
    literal_count: usize,
}

impl Schema {
    pub(crate) fn new(owner: String, parts: Vec<KeyPart>) -> Self {
        let by_name = parts
            .iter()
            .enumerate()
            .map(|(index, part)| (part.name.clone(), index))
            .collect();
        let literal_count = parts.iter().filter(|p| p.definition.is_literal()).count();
        Self {
            owner,
            parts,
            by_name,
            literal_count,
        }
    }

    /// The type whose declaration produced this schema.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether the schema has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Parts in canonical order.
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    /// Part names in canonical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(KeyPart::name)
    }

    /// Looks up a part by name.
    pub fn part(&self, name: &str) -> Option<&KeyPart> {
        self.index_of(name).map(|index| &self.parts[index])
    }

    /// Canonical index of a part.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Number of literal slots.
    pub fn literal_count(&self) -> usize {
        self.literal_count
    }
}
