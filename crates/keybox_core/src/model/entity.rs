//! Entities: objects whose fields key paths read and write.

use crate::model::catalog::{PropertyType, TypeInfo};
use keybox_codec::Value;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// An object with positional fields, laid out as its type's flattened
/// property table.
///
/// Implementations use interior mutability; key rings read and write fields
/// through shared references from any thread.
pub trait Entity: Send + Sync + 'static {
    /// Name of the runtime type.
    fn type_name(&self) -> &str;

    /// Reads the field at `index`, or `None` if the type has no such field.
    fn field(&self, index: usize) -> Option<Field>;

    /// Writes the field at `index`.
    ///
    /// Returns `false` if the type has no such field or the field's shape
    /// does not match the property.
    fn set_field(&self, index: usize, value: Field) -> bool;
}

/// Shared handle to an entity.
pub type Instance = Arc<dyn Entity>;

/// Identity token of an instance: the address of its allocation.
pub(crate) fn identity(instance: &Instance) -> usize {
    Arc::as_ptr(instance).cast::<()>() as usize
}

/// Whether two handles point at the same entity.
pub fn same_instance(a: &Instance, b: &Instance) -> bool {
    identity(a) == identity(b)
}

/// The content of one entity field.
#[derive(Clone)]
pub enum Field {
    /// A plain value; [`Value::Null`] is unset.
    Value(Value),
    /// A reference to another entity; `None` is unset.
    Object(Option<Instance>),
}

impl Field {
    /// The unset field for a property of the given type.
    pub fn unset(ty: &PropertyType) -> Self {
        match ty {
            PropertyType::Value(_) => Field::Value(Value::Null),
            PropertyType::Object(_) => Field::Object(None),
        }
    }

    /// Whether the field holds nothing.
    pub fn is_unset(&self) -> bool {
        match self {
            Field::Value(value) => value.is_null(),
            Field::Object(object) => object.is_none(),
        }
    }

    /// The value, if this is a value field.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            Field::Object(_) => None,
        }
    }

    /// The referenced entity, if this is a set object field.
    pub fn as_object(&self) -> Option<&Instance> {
        match self {
            Field::Object(object) => object.as_ref(),
            Field::Value(_) => None,
        }
    }

    fn fits(&self, ty: &PropertyType) -> bool {
        match (self, ty) {
            (Field::Value(value), PropertyType::Value(value_type)) => value_type.accepts(value),
            (Field::Object(_), PropertyType::Object(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Field::Object(None) => f.write_str("Object(None)"),
            Field::Object(Some(object)) => write!(f, "Object({}@{:#x})", object.type_name(), identity(object)),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::Value(value)
    }
}

impl From<Instance> for Field {
    fn from(instance: Instance) -> Self {
        Field::Object(Some(instance))
    }
}

/// Generic entity backed by a field vector, shaped by a [`TypeInfo`].
pub struct Record {
    info: Arc<TypeInfo>,
    fields: RwLock<Vec<Field>>,
}

impl Record {
    /// Creates a record with every field unset.
    pub fn new(info: Arc<TypeInfo>) -> Self {
        let fields = info
            .properties()
            .iter()
            .map(|property| Field::unset(&property.ty))
            .collect();
        Self {
            info,
            fields: RwLock::new(fields),
        }
    }

    /// The record's type.
    pub fn info(&self) -> &Arc<TypeInfo> {
        &self.info
    }

    /// Reads a field by property name.
    pub fn get(&self, name: &str) -> Option<Field> {
        let (index, _) = self.info.property(name)?;
        self.field(index)
    }

    /// Reads a value field by property name; unset and unknown read as null.
    pub fn value(&self, name: &str) -> Value {
        match self.get(name) {
            Some(Field::Value(value)) => value,
            _ => Value::Null,
        }
    }

    /// Reads an object field by property name.
    pub fn object(&self, name: &str) -> Option<Instance> {
        self.get(name).and_then(|field| field.as_object().cloned())
    }

    /// Writes a field by property name.
    pub fn set(&self, name: &str, value: impl Into<Field>) -> bool {
        match self.info.property(name) {
            Some((index, _)) => self.set_field(index, value.into()),
            None => false,
        }
    }
}

impl Entity for Record {
    fn type_name(&self) -> &str {
        self.info.name()
    }

    fn field(&self, index: usize) -> Option<Field> {
        self.fields.read().get(index).cloned()
    }

    fn set_field(&self, index: usize, value: Field) -> bool {
        let Some(property) = self.info.properties().get(index) else {
            return false;
        };
        if !value.fits(&property.ty) {
            return false;
        }
        let mut fields = self.fields.write();
        fields[index] = value;
        true
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields.read();
        let mut map = f.debug_map();
        for (property, field) in self.info.properties().iter().zip(fields.iter()) {
            map.entry(&property.name, field);
        }
        map.finish()
    }
}
