//! Key schemas: declaration, compilation and the committed schema set.

mod definition;
mod path;
mod registry;

pub use definition::{KeyDefinition, KeyPart, KeySpec, PathStep, PropertyPath, Schema};
pub use registry::{RegistryState, SchemaRegistry, SchemaSet};
