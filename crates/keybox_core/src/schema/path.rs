//! Compiles `/`-separated path strings against the type catalog.

use crate::error::{KeyBoxError, KeyBoxResult};
use crate::model::{PropertyType, TypeCatalog};
use crate::schema::definition::{PathStep, PropertyPath};
use keybox_codec::ValueType;

/// Outcome of compiling one key part path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompiledPath {
    /// The terminal segment is a value property.
    Field {
        path: PropertyPath,
        value_type: ValueType,
    },
    /// The terminal segment names a part of the related object's key.
    ForeignKey {
        path: PropertyPath,
        foreign_part: String,
    },
}

/// Compiles `raw` for part `part` of `type_name`.
pub(crate) fn compile_path(
    catalog: &TypeCatalog,
    type_name: &str,
    part: &str,
    raw: &str,
) -> KeyBoxResult<CompiledPath> {
    let malformed = || KeyBoxError::MalformedPath {
        type_name: type_name.to_string(),
        part: part.to_string(),
        path: raw.to_string(),
    };

    let Some(rest) = raw.strip_prefix('/') else {
        return Err(malformed());
    };
    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(malformed());
    }

    let invalid = |segment: &str| KeyBoxError::InvalidPathSegment {
        type_name: type_name.to_string(),
        part: part.to_string(),
        segment: segment.to_string(),
    };

    let mut current = catalog.require(type_name)?;
    let mut steps = Vec::with_capacity(segments.len());
    let last = segments.len() - 1;

    for (position, segment) in segments.iter().copied().enumerate() {
        let terminal = position == last;
        let Some((index, property)) = current.property(segment) else {
            if !terminal {
                return Err(invalid(segment));
            }
            if segments.len() < 2 {
                return Err(KeyBoxError::PathTooShort {
                    type_name: type_name.to_string(),
                    part: part.to_string(),
                    path: raw.to_string(),
                });
            }
            return Ok(CompiledPath::ForeignKey {
                path: PropertyPath::new(steps),
                foreign_part: segment.to_string(),
            });
        };

        if property.nullable {
            return Err(KeyBoxError::NullablePathSegment {
                type_name: type_name.to_string(),
                part: part.to_string(),
                segment: segment.to_string(),
            });
        }

        steps.push(PathStep {
            segment: segment.to_string(),
            property: index,
            ty: property.ty.clone(),
        });

        match (&property.ty, terminal) {
            (PropertyType::Value(value_type), true) => {
                let value_type = *value_type;
                return Ok(CompiledPath::Field {
                    path: PropertyPath::new(steps),
                    value_type,
                });
            }
            (PropertyType::Object(next), false) => {
                current = catalog.require(next)?;
            }
            _ => return Err(invalid(segment)),
        }
    }

    // The loop returns on the terminal segment.
    Err(malformed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyDescriptor, TypeDescriptor};

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog
            .register_all([
                TypeDescriptor::class("Customer").value("Code", ValueType::Text),
                TypeDescriptor::class("Order")
                    .value("Number", ValueType::Integer)
                    .object("Customer", "Customer")
                    .property(PropertyDescriptor::object("Referrer", "Customer").nullable()),
                TypeDescriptor::class("Line")
                    .value("Position", ValueType::Integer)
                    .object("Order", "Order"),
            ])
            .unwrap();
        catalog
    }

    #[test]
    fn compiles_field_paths() {
        let catalog = catalog();
        let compiled = compile_path(&catalog, "Line", "Number", "/Order/Number").unwrap();
        let CompiledPath::Field { path, value_type } = compiled else {
            panic!("expected field path");
        };
        assert_eq!(value_type, ValueType::Integer);
        assert_eq!(path.to_string(), "/Order/Number");
        assert_eq!(path.steps()[0].property(), 1);
        assert_eq!(path.leaf().property(), 0);
    }

    #[test]
    fn terminal_non_property_is_a_foreign_key() {
        let catalog = catalog();
        let compiled = compile_path(&catalog, "Line", "Customer", "/Order/Customer/Code2").unwrap();
        let CompiledPath::ForeignKey { path, foreign_part } = compiled else {
            panic!("expected foreign key path");
        };
        assert_eq!(foreign_part, "Code2");
        assert_eq!(path.related_type(), Some("Customer"));
        assert_eq!(path.steps().len(), 2);
    }

    #[test]
    fn rejects_malformed_paths() {
        let catalog = catalog();
        for raw in ["Number", "", "/", "//Number", "/Order//Number", "/Order/"] {
            assert!(
                matches!(
                    compile_path(&catalog, "Line", "P", raw),
                    Err(KeyBoxError::MalformedPath { .. })
                ),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn rejects_bad_segments() {
        let catalog = catalog();
        assert!(matches!(
            compile_path(&catalog, "Line", "P", "/Missing/Number"),
            Err(KeyBoxError::InvalidPathSegment { segment, .. }) if segment == "Missing"
        ));
        assert!(matches!(
            compile_path(&catalog, "Line", "P", "/Position/Number"),
            Err(KeyBoxError::InvalidPathSegment { segment, .. }) if segment == "Position"
        ));
        assert!(matches!(
            compile_path(&catalog, "Line", "P", "/Order"),
            Err(KeyBoxError::InvalidPathSegment { segment, .. }) if segment == "Order"
        ));
    }

    #[test]
    fn rejects_nullable_segments() {
        let catalog = catalog();
        assert!(matches!(
            compile_path(&catalog, "Order", "P", "/Referrer/Code"),
            Err(KeyBoxError::NullablePathSegment { segment, .. }) if segment == "Referrer"
        ));
    }

    #[test]
    fn single_segment_foreign_key_is_too_short() {
        let catalog = catalog();
        assert!(matches!(
            compile_path(&catalog, "Order", "P", "/Code"),
            Err(KeyBoxError::PathTooShort { .. })
        ));
    }
}
