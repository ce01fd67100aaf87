//! Object model: declared types, entities and the factory that creates them.

mod catalog;
mod entity;
mod factory;

pub use catalog::{PropertyDescriptor, PropertyType, TypeCatalog, TypeDescriptor, TypeInfo, TypeKind};
pub(crate) use entity::identity;
pub use entity::{same_instance, Entity, Field, Instance, Record};
pub use factory::{InstanceFactory, RecordFactory};
