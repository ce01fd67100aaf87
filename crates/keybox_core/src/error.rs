//! Error types for KeyBox core.

use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type KeyBoxResult<T> = Result<T, KeyBoxError>;

/// Errors raised while declaring key schemas or resolving keys at runtime.
#[derive(Debug, Error)]
pub enum KeyBoxError {
    /// Codec error while encoding or decoding a key envelope.
    #[error("codec error: {0}")]
    Codec(#[from] keybox_codec::CodecError),

    /// The type is not registered in the type catalog.
    #[error("unknown type: {type_name}")]
    UnknownType {
        /// Name that was looked up.
        type_name: String,
    },

    /// A type with the same name is already registered in the catalog.
    #[error("type {type_name} is already registered")]
    DuplicateType {
        /// Name of the type.
        type_name: String,
    },

    /// A property name appears twice in one type's property table.
    #[error("type {type_name} declares property {property} more than once")]
    DuplicateProperty {
        /// Owning type.
        type_name: String,
        /// Repeated property name.
        property: String,
    },

    /// A key declaration for the type already exists.
    #[error("Key for {type_name} is already mapped")]
    AlreadyMapped {
        /// Type declared twice.
        type_name: String,
    },

    /// Keys can only be declared for classes.
    #[error("{type_name} must be a class")]
    NotAClass {
        /// Offending type.
        type_name: String,
    },

    /// The same key part name was declared twice for one type.
    #[error("key part {part} is declared more than once for {type_name}")]
    DuplicatePart {
        /// Type being declared.
        type_name: String,
        /// Repeated part name.
        part: String,
    },

    /// A path does not start with `/` or contains an empty segment.
    #[error("path {path:?} for key part {part} of {type_name} must start with / and have no empty segments")]
    MalformedPath {
        /// Type being declared.
        type_name: String,
        /// Key part name.
        part: String,
        /// The path as given.
        path: String,
    },

    /// A path segment does not resolve to a usable property.
    #[error("path for key part {part} of {type_name} has invalid part: {segment}")]
    InvalidPathSegment {
        /// Type being declared.
        type_name: String,
        /// Key part name.
        part: String,
        /// The segment that failed to resolve.
        segment: String,
    },

    /// A path segment crosses a nullable property.
    #[error("path for key part {part} of {type_name} has nullable part: {segment}")]
    NullablePathSegment {
        /// Type being declared.
        type_name: String,
        /// Key part name.
        part: String,
        /// The nullable segment.
        segment: String,
    },

    /// A foreign-key path has fewer than two segments.
    #[error("foreign key path {path:?} for key part {part} of {type_name} needs at least two segments")]
    PathTooShort {
        /// Type being declared.
        type_name: String,
        /// Key part name.
        part: String,
        /// The path as given.
        path: String,
    },

    /// The schema registry was already committed.
    #[error("schema registry is already configured")]
    AlreadyConfigured,

    /// An alias chain loops back onto itself.
    #[error("Example loop detected: {type_name}")]
    ExampleLoopDetected {
        /// First type found twice on the resolution stack.
        type_name: String,
    },

    /// Alias chains that end in a type with no declaration.
    #[error("Keys not mapped for: {}", .types.join(", "))]
    KeysNotMapped {
        /// Affected types, sorted and deduplicated.
        types: Vec<String>,
    },

    /// Foreign-key parts whose target part does not exist.
    #[error("invalid foreign key paths: {}", join_issues(.issues))]
    InvalidForeignKeyPath {
        /// Every failing foreign-key part across all declarations.
        issues: Vec<ForeignKeyIssue>,
    },

    /// A foreign-key chain delegates back to a part already on the chain.
    #[error("foreign key chain starting at {type_name}.{part} loops")]
    ForeignKeyLoop {
        /// Declaring type of the first part on the chain.
        type_name: String,
        /// Part name.
        part: String,
    },

    /// A null instance was passed where one is required.
    #[error("instance must not be null")]
    NullInstance,

    /// A null value was passed to the object cache.
    #[error("value must not be null")]
    NullValue,

    /// The key ring is not completed.
    #[error("key ring for {type_name} must be completed")]
    IncompleteKey {
        /// Type the ring was created for.
        type_name: String,
    },

    /// The cached or incoming value is not compatible with the declared type.
    #[error("{actual} must implement or be {expected}")]
    TypeMismatch {
        /// Declared type.
        expected: String,
        /// Runtime type.
        actual: String,
    },

    /// The key part name is not part of the schema.
    #[error("{type_name} has no key part {part}")]
    UnknownPart {
        /// Type the ring was created for.
        type_name: String,
        /// Requested part name.
        part: String,
    },

    /// Positional access past the last key part.
    #[error("key part index {index} out of range for {count} parts")]
    PartIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of parts in the schema.
        count: usize,
    },

    /// The value does not fit the part's declared type.
    #[error("key part {part} expects {expected}, got {actual}")]
    PartTypeMismatch {
        /// Part name.
        part: String,
        /// Declared value type.
        expected: keybox_codec::ValueType,
        /// Kind of the rejected value.
        actual: &'static str,
    },

    /// A bound key ring outlived its source instance.
    #[error("source instance of {type_name} key ring was released")]
    SourceReleased {
        /// Type the ring was created for.
        type_name: String,
    },

    /// A key ring outlived the registry that created it.
    #[error("key registry was released")]
    RegistryReleased,

    /// Several distinct schemas apply to an abstract type.
    #[error("schema for {type_name} is ambiguous between: {}", .candidates.join(", "))]
    AmbiguousSchema {
        /// Requested type.
        type_name: String,
        /// Schema-bearing implementors, in declaration order.
        candidates: Vec<String>,
    },

    /// A navigation target has no key schema.
    #[error("no key schema applies to {type_name}")]
    NoSchema {
        /// Runtime type of the navigation target.
        type_name: String,
    },

    /// An entity returned a field of the wrong shape during navigation.
    #[error("field {segment} of {type_name} does not have its declared shape")]
    PathMismatch {
        /// Runtime type of the entity.
        type_name: String,
        /// Path segment being navigated.
        segment: String,
    },

    /// The factory cannot create an instance of the type.
    #[error("cannot instantiate {type_name}: {reason}")]
    NotInstantiable {
        /// Requested type.
        type_name: String,
        /// Why creation failed.
        reason: String,
    },

    /// An instance-less ring's new source already has another key ring.
    #[error("new {type_name} source already has a key ring attached")]
    AlreadyAttached {
        /// Type the ring was created for.
        type_name: String,
    },

    /// The factory created a source that does not use the ring's schema.
    #[error("factory created {created} for {type_name}, which does not use its key schema")]
    SourceSchemaMismatch {
        /// Type the ring was created for.
        type_name: String,
        /// Runtime type of the created instance.
        created: String,
    },

    /// An encoded key references a type id that was never handed out.
    #[error("unknown type id {type_id}")]
    UnknownTypeId {
        /// Id found on the wire.
        type_id: u32,
    },

    /// An encoded key has the wrong number of parts.
    #[error("{type_name} key has {expected} parts, encoded key has {actual}")]
    PartCountMismatch {
        /// Type named by the key.
        type_name: String,
        /// Parts in the schema.
        expected: usize,
        /// Parts on the wire.
        actual: usize,
    },
}

/// One failing foreign-key part found during commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyIssue {
    /// Declaring type.
    pub type_name: String,
    /// Foreign-key part name.
    pub part: String,
    /// Type reached by the path.
    pub related_type: String,
    /// Part that was expected on the related type's key.
    pub missing_part: String,
}

impl fmt::Display for ForeignKeyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: primary key field {} is not defined for {}",
            self.type_name, self.part, self.missing_part, self.related_type
        )
    }
}

fn join_issues(issues: &[ForeignKeyIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl KeyBoxError {
    /// Creates an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Creates a not instantiable error.
    pub fn not_instantiable(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotInstantiable {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an incomplete key error.
    pub fn incomplete_key(type_name: impl Into<String>) -> Self {
        Self::IncompleteKey {
            type_name: type_name.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether this error is raised by schema declaration or commit.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownType { .. }
                | Self::DuplicateType { .. }
                | Self::DuplicateProperty { .. }
                | Self::AlreadyMapped { .. }
                | Self::NotAClass { .. }
                | Self::DuplicatePart { .. }
                | Self::MalformedPath { .. }
                | Self::InvalidPathSegment { .. }
                | Self::NullablePathSegment { .. }
                | Self::PathTooShort { .. }
                | Self::AlreadyConfigured
                | Self::ExampleLoopDetected { .. }
                | Self::KeysNotMapped { .. }
                | Self::InvalidForeignKeyPath { .. }
                | Self::ForeignKeyLoop { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_declaration_wording() {
        let err = KeyBoxError::AlreadyMapped {
            type_name: "Poco1".into(),
        };
        assert_eq!(err.to_string(), "Key for Poco1 is already mapped");

        let err = KeyBoxError::KeysNotMapped {
            types: vec!["Poco1".into(), "Poco2".into(), "Poco3".into()],
        };
        assert_eq!(err.to_string(), "Keys not mapped for: Poco1, Poco2, Poco3");

        let err = KeyBoxError::ExampleLoopDetected {
            type_name: "Poco1".into(),
        };
        assert_eq!(err.to_string(), "Example loop detected: Poco1");
    }

    #[test]
    fn foreign_key_issues_are_listed() {
        let err = KeyBoxError::InvalidForeignKeyPath {
            issues: vec![
                ForeignKeyIssue {
                    type_name: "Order".into(),
                    part: "Customer".into(),
                    related_type: "Customer".into(),
                    missing_part: "Code".into(),
                },
                ForeignKeyIssue {
                    type_name: "Line".into(),
                    part: "Order".into(),
                    related_type: "Order".into(),
                    missing_part: "Number".into(),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("Order.Customer"));
        assert!(message.contains("Line.Order"));
    }

    #[test]
    fn classifies_configuration_errors() {
        assert!(KeyBoxError::AlreadyConfigured.is_configuration_error());
        assert!(!KeyBoxError::NullInstance.is_configuration_error());
        assert!(!KeyBoxError::incomplete_key("T").is_configuration_error());
    }
}
