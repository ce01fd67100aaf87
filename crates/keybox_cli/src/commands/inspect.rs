//! Inspect command implementation.

use crate::manifest::{ManifestResult, Model};
use keybox_core::{KeyDefinition, Schema};
use serde::Serialize;
use std::path::Path;

/// Compiled keys of a model.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Model file path.
    pub path: String,
    /// Declared keys in type id order.
    pub keys: Vec<KeyInfo>,
}

/// The compiled key of one declared type.
#[derive(Debug, Serialize)]
pub struct KeyInfo {
    /// Wire type id.
    pub type_id: u32,
    /// Declared type.
    pub type_name: String,
    /// Type whose declaration the key uses (differs for aliases).
    pub owner: String,
    /// Parts in canonical order.
    pub parts: Vec<PartInfo>,
}

/// One compiled part.
#[derive(Debug, Serialize)]
pub struct PartInfo {
    /// Canonical index.
    pub index: usize,
    /// Part name.
    pub name: String,
    /// `literal`, `path` or `foreign-key`.
    pub kind: &'static str,
    /// Value type.
    pub value_type: String,
    /// Path of a derived part.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Related part a foreign key reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreign_part: Option<String>,
}

/// Loads a model and describes its compiled keys.
pub fn inspect(path: &Path) -> ManifestResult<InspectResult> {
    let model = Model::load(path)?;
    let keys = model
        .schemas
        .declared_types()
        .zip(0u32..)
        .filter_map(|(type_name, type_id)| {
            model
                .schemas
                .schema_of(type_name)
                .map(|schema| describe(type_id, type_name, schema))
        })
        .collect();
    Ok(InspectResult {
        path: path.display().to_string(),
        keys,
    })
}

fn describe(type_id: u32, type_name: &str, schema: &Schema) -> KeyInfo {
    let parts = schema
        .parts()
        .iter()
        .map(|part| {
            let definition = part.definition();
            let (kind, foreign_part) = match definition {
                KeyDefinition::Literal { .. } => ("literal", None),
                KeyDefinition::ByPath { .. } => ("path", None),
                KeyDefinition::ByForeignKey { foreign_part, .. } => {
                    ("foreign-key", Some(foreign_part.clone()))
                }
            };
            PartInfo {
                index: definition.index(),
                name: part.name().to_string(),
                kind,
                value_type: definition.value_type().to_string(),
                path: definition.path().map(ToString::to_string),
                foreign_part,
            }
        })
        .collect();
    KeyInfo {
        type_id,
        type_name: type_name.to_string(),
        owner: schema.owner().to_string(),
        parts,
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("KeyBox Model: {}", result.path);
    for key in &result.keys {
        println!();
        if key.owner == key.type_name {
            println!("[{}] {}", key.type_id, key.type_name);
        } else {
            println!("[{}] {} (alias of {})", key.type_id, key.type_name, key.owner);
        }
        for part in &key.parts {
            let source = match (&part.path, &part.foreign_part) {
                (Some(path), Some(foreign)) => format!("{path} -> {foreign}"),
                (Some(path), None) => path.clone(),
                _ => String::from("-"),
            };
            println!(
                "  {:>2} {:<16} {:<8} {:<11} {}",
                part.index, part.name, part.value_type, part.kind, source
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ORDERS;
    use std::io::Write;

    fn orders_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ORDERS.as_bytes()).unwrap();
        file
    }

    #[test]
    fn describes_every_declared_key() {
        let file = orders_file();
        let result = inspect(file.path()).unwrap();
        let names: Vec<_> = result.keys.iter().map(|k| k.type_name.as_str()).collect();
        assert_eq!(names, ["Customer", "Order", "Quote"]);

        let order = &result.keys[1];
        assert_eq!(order.type_id, 1);
        let kinds: Vec<_> = order.parts.iter().map(|p| (p.name.as_str(), p.kind)).collect();
        assert_eq!(kinds, [("Area", "literal"), ("Client", "path"), ("Number", "path")]);
        assert_eq!(order.parts[1].path.as_deref(), Some("/Customer/Code"));

        let quote = &result.keys[2];
        assert_eq!(quote.owner, "Order");
    }

    #[test]
    fn serializes_to_json() {
        let file = orders_file();
        let result = inspect(file.path()).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["keys"][0]["parts"][0]["value_type"], "text");
        assert!(json["keys"][1]["parts"][0].get("path").is_none());
    }
}
