//! Type catalog: the declared shape of every type that can carry a key.
//!
//! Types are registered once, in dependency order (a base class and the
//! interfaces a type implements must already be registered). Registration
//! flattens each class's property table so that inherited properties keep the
//! index they have in the base class; compiled key paths rely on that to
//! address fields by position on any subclass instance.

use crate::error::{KeyBoxError, KeyBoxResult};
use crate::model::entity::{Entity, Field};
use keybox_codec::ValueType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The kind of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// A concrete class that a factory can instantiate.
    Class,
    /// A class that cannot be instantiated directly.
    Abstract,
    /// A capability implemented by classes.
    Interface,
    /// A value type; never carries a key.
    Value,
}

impl TypeKind {
    /// Whether the kind is a class (concrete or abstract).
    pub fn is_class(self) -> bool {
        matches!(self, TypeKind::Class | TypeKind::Abstract)
    }
}

/// The declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// A plain value field.
    Value(ValueType),
    /// A reference to another object.
    Object(String),
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Value(ty) => write!(f, "{ty}"),
            PropertyType::Object(name) => f.write_str(name),
        }
    }
}

/// One property of a declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Declared type.
    pub ty: PropertyType,
    /// Whether the property is declared nullable.
    pub nullable: bool,
    /// Whether the property can be written.
    pub writable: bool,
}

impl PropertyDescriptor {
    /// A non-nullable, writable value property.
    pub fn value(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty: PropertyType::Value(ty),
            nullable: false,
            writable: true,
        }
    }

    /// A non-nullable, writable object property.
    pub fn object(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: PropertyType::Object(type_name.into()),
            nullable: false,
            writable: true,
        }
    }

    /// Marks the property nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the property read-only.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// Declaration of one type, as handed to [`TypeCatalog::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    base: Option<String>,
    interfaces: Vec<String>,
    properties: Vec<PropertyDescriptor>,
}

impl TypeDescriptor {
    /// Declares a type of the given kind.
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            interfaces: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Declares a concrete class.
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Declares an abstract class.
    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Abstract)
    }

    /// Declares an interface.
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Declares a value type.
    pub fn value_type(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Value)
    }

    /// Sets the base class.
    #[must_use]
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Adds an implemented interface (or a super-interface for interfaces).
    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds a non-nullable value property.
    #[must_use]
    pub fn value(self, name: impl Into<String>, ty: ValueType) -> Self {
        self.property(PropertyDescriptor::value(name, ty))
    }

    /// Adds a non-nullable object property.
    #[must_use]
    pub fn object(self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.property(PropertyDescriptor::object(name, type_name))
    }

    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A registered type with its flattened property table.
#[derive(Debug)]
pub struct TypeInfo {
    name: String,
    kind: TypeKind,
    ancestry: Vec<String>,
    interfaces: Vec<String>,
    properties: Vec<PropertyDescriptor>,
    by_name: HashMap<String, usize>,
}

impl TypeInfo {
    /// Type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type kind.
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// This type followed by its base classes, nearest first.
    pub fn ancestry(&self) -> impl Iterator<Item = &str> {
        self.ancestry.iter().map(String::as_str)
    }

    /// Every interface implemented directly or through a base, in
    /// declaration order.
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(String::as_str)
    }

    /// The flattened property table; inherited properties come first.
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Looks up a property and its index by name.
    pub fn property(&self, name: &str) -> Option<(usize, &PropertyDescriptor)> {
        self.by_name
            .get(name)
            .map(|&index| (index, &self.properties[index]))
    }

    /// Whether this type is `other`, derives from it, or implements it.
    pub fn is_subtype_of(&self, other: &str) -> bool {
        self.ancestry.iter().any(|t| t == other) || self.interfaces.iter().any(|t| t == other)
    }

    /// Whether this type implements the interface `interface`.
    pub fn implements(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|t| t == interface)
    }
}

/// Registry of declared types.
#[derive(Debug, Default)]
pub struct TypeCatalog {
    types: HashMap<String, Arc<TypeInfo>>,
    order: Vec<String>,
}

impl TypeCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken, the base or an interface is unknown or of
    /// the wrong kind, an interface or value type declares a base, or a
    /// property name repeats (including inherited names).
    pub fn register(&mut self, descriptor: TypeDescriptor) -> KeyBoxResult<Arc<TypeInfo>> {
        let TypeDescriptor {
            name,
            kind,
            base,
            interfaces,
            properties: own,
        } = descriptor;

        if self.types.contains_key(&name) {
            return Err(KeyBoxError::DuplicateType { type_name: name });
        }

        let mut ancestry = vec![name.clone()];
        let mut all_interfaces: Vec<String> = Vec::new();
        let mut properties = Vec::new();

        if let Some(base) = base {
            let base_info = self.require(&base)?;
            if !kind.is_class() || !base_info.kind.is_class() {
                return Err(KeyBoxError::NotAClass { type_name: base });
            }
            ancestry.extend(base_info.ancestry.iter().cloned());
            all_interfaces.extend(base_info.interfaces.iter().cloned());
            properties.extend(base_info.properties.iter().cloned());
        }

        for interface in interfaces {
            let info = self.require(&interface)?;
            if info.kind != TypeKind::Interface {
                return Err(KeyBoxError::unknown_type(format!("interface {interface}")));
            }
            for inherited in std::iter::once(&interface).chain(info.interfaces.iter()) {
                if !all_interfaces.contains(inherited) {
                    all_interfaces.push(inherited.clone());
                }
            }
        }

        // Interfaces only mark capabilities; fields live on classes so that
        // property indices stay stable down a class hierarchy.
        if kind == TypeKind::Interface && !own.is_empty() {
            return Err(KeyBoxError::NotAClass { type_name: name });
        }

        properties.extend(own);
        let mut by_name = HashMap::with_capacity(properties.len());
        for (index, property) in properties.iter().enumerate() {
            if by_name.insert(property.name.clone(), index).is_some() {
                return Err(KeyBoxError::DuplicateProperty {
                    type_name: name,
                    property: property.name.clone(),
                });
            }
        }

        let info = Arc::new(TypeInfo {
            name: name.clone(),
            kind,
            ancestry,
            interfaces: all_interfaces,
            properties,
            by_name,
        });
        self.order.push(name.clone());
        self.types.insert(name, Arc::clone(&info));
        Ok(info)
    }

    /// Registers several types in order.
    ///
    /// # Errors
    ///
    /// Stops at the first descriptor [`register`](Self::register) rejects.
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = TypeDescriptor>,
    ) -> KeyBoxResult<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Looks up a type.
    pub fn get(&self, name: &str) -> Option<&Arc<TypeInfo>> {
        self.types.get(name)
    }

    /// Looks up a type, failing with [`KeyBoxError::UnknownType`].
    pub fn require(&self, name: &str) -> KeyBoxResult<&Arc<TypeInfo>> {
        self.types
            .get(name)
            .ok_or_else(|| KeyBoxError::unknown_type(name))
    }

    /// Whether a type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeInfo>> {
        self.order.iter().filter_map(|name| self.types.get(name))
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reads a field of an entity by property name.
    ///
    /// # Errors
    ///
    /// Fails if the entity's type is unknown or has no such property.
    pub fn read(&self, entity: &dyn Entity, property: &str) -> KeyBoxResult<Field> {
        let index = self.property_index(entity, property)?;
        entity
            .field(index)
            .ok_or_else(|| KeyBoxError::PathMismatch {
                type_name: entity.type_name().to_string(),
                segment: property.to_string(),
            })
    }

    /// Writes a field of an entity by property name.
    ///
    /// # Errors
    ///
    /// Fails if the entity's type is unknown, has no such property, or the
    /// entity rejects the field's shape.
    pub fn write(&self, entity: &dyn Entity, property: &str, value: Field) -> KeyBoxResult<()> {
        let index = self.property_index(entity, property)?;
        if entity.set_field(index, value) {
            Ok(())
        } else {
            Err(KeyBoxError::PathMismatch {
                type_name: entity.type_name().to_string(),
                segment: property.to_string(),
            })
        }
    }

    fn property_index(&self, entity: &dyn Entity, property: &str) -> KeyBoxResult<usize> {
        let info = self.require(entity.type_name())?;
        info.property(property)
            .map(|(index, _)| index)
            .ok_or_else(|| KeyBoxError::PathMismatch {
                type_name: info.name.clone(),
                segment: property.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog
            .register_all([
                TypeDescriptor::interface("INamed"),
                TypeDescriptor::interface("IParty").implements("INamed"),
                TypeDescriptor::abstract_class("Entity").value("Id", ValueType::Integer),
                TypeDescriptor::class("Customer")
                    .extends("Entity")
                    .implements("IParty")
                    .value("Name", ValueType::Text),
                TypeDescriptor::class("VipCustomer")
                    .extends("Customer")
                    .value("Tier", ValueType::Integer),
            ])
            .unwrap();
        catalog
    }

    #[test]
    fn inherited_properties_keep_their_index() {
        let catalog = catalog();
        let vip = catalog.get("VipCustomer").unwrap();
        assert_eq!(vip.property("Id").unwrap().0, 0);
        assert_eq!(vip.property("Name").unwrap().0, 1);
        assert_eq!(vip.property("Tier").unwrap().0, 2);
        assert_eq!(
            catalog.get("Customer").unwrap().property("Name").unwrap().0,
            1
        );
    }

    #[test]
    fn ancestry_and_interfaces() {
        let catalog = catalog();
        let vip = catalog.get("VipCustomer").unwrap();
        assert_eq!(
            vip.ancestry().collect::<Vec<_>>(),
            vec!["VipCustomer", "Customer", "Entity"]
        );
        assert_eq!(vip.interfaces().collect::<Vec<_>>(), vec!["IParty", "INamed"]);
        assert!(vip.is_subtype_of("Entity"));
        assert!(vip.implements("INamed"));
        assert!(!vip.implements("Customer"));
    }

    #[test]
    fn rejects_unknown_base_and_duplicates() {
        let mut catalog = catalog();
        assert!(matches!(
            catalog.register(TypeDescriptor::class("Order").extends("Missing")),
            Err(KeyBoxError::UnknownType { .. })
        ));
        assert!(matches!(
            catalog.register(TypeDescriptor::class("Customer")),
            Err(KeyBoxError::DuplicateType { .. })
        ));
        assert!(matches!(
            catalog.register(
                TypeDescriptor::class("Shadow")
                    .extends("Customer")
                    .value("Name", ValueType::Text)
            ),
            Err(KeyBoxError::DuplicateProperty { .. })
        ));
    }

    #[test]
    fn interfaces_cannot_carry_fields_or_bases() {
        let mut catalog = catalog();
        assert!(matches!(
            catalog.register(TypeDescriptor::interface("IKeyed").value("Id", ValueType::Integer)),
            Err(KeyBoxError::NotAClass { .. })
        ));
        assert!(matches!(
            catalog.register(TypeDescriptor::interface("IBad").extends("Customer")),
            Err(KeyBoxError::NotAClass { .. })
        ));
        assert!(matches!(
            catalog.register(TypeDescriptor::class("Bad").implements("Customer")),
            Err(KeyBoxError::UnknownType { .. })
        ));
    }

    #[test]
    fn iterates_in_registration_order() {
        let catalog = catalog();
        let names: Vec<_> = catalog.iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names[0], "INamed");
        assert_eq!(names.last().unwrap(), "VipCustomer");
        assert_eq!(catalog.len(), 5);
    }
}
