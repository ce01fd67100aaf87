//! Check command implementation.

use crate::manifest::{Model, ManifestResult};
use keybox_core::TypeKind;
use serde::Serialize;
use std::path::Path;

/// Model check result.
#[derive(Debug, Serialize)]
pub struct CheckResult {
    /// Model file path.
    pub path: String,
    /// Number of catalog types.
    pub type_count: usize,
    /// Number of declared keys, aliases included.
    pub key_count: usize,
    /// Classes with no applicable key.
    pub unkeyed_classes: Vec<String>,
}

/// Loads and validates a model file.
pub fn check(path: &Path) -> ManifestResult<CheckResult> {
    let model = Model::load(path)?;
    let mut unkeyed_classes: Vec<String> = model
        .catalog
        .iter()
        .filter(|info| info.kind() == TypeKind::Class)
        .filter(|info| !matches!(model.schemas.resolve(info.name()), Ok(Some(_))))
        .map(|info| info.name().to_string())
        .collect();
    unkeyed_classes.sort();

    Ok(CheckResult {
        path: path.display().to_string(),
        type_count: model.catalog.len(),
        key_count: model.schemas.len(),
        unkeyed_classes,
    })
}

/// Runs the check command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = check(path)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            println!("Model OK: {}", result.path);
            println!("  Types: {}", result.type_count);
            println!("  Keys:  {}", result.key_count);
            if !result.unkeyed_classes.is_empty() {
                println!("  Classes without keys: {}", result.unkeyed_classes.join(", "));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ManifestError, ORDERS};
    use std::io::Write;

    #[test]
    fn reports_model_counts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ORDERS.as_bytes()).unwrap();
        let result = check(file.path()).unwrap();
        assert_eq!(result.type_count, 4);
        assert_eq!(result.key_count, 3);
        assert!(result.unkeyed_classes.is_empty());
    }

    #[test]
    fn lists_unkeyed_classes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{ "types": [{ "name": "B" }, { "name": "A" }, { "name": "K" }],
                  "keys": [{ "type": "K", "parts": { "ID": "integer" } }] }"#,
        )
        .unwrap();
        let result = check(file.path()).unwrap();
        assert_eq!(result.unkeyed_classes, ["A", "B"]);
    }

    #[test]
    fn rejects_invalid_models() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{ "types": [{ "name": "A", "properties": [
                    { "name": "Next", "object": "A", "nullable": true }
                ] }],
                  "keys": [{ "type": "A", "parts": { "ID": "/Next/ID" } }] }"#,
        )
        .unwrap();
        let err = check(file.path()).unwrap_err();
        assert!(matches!(err, ManifestError::KeyBox(ref e) if e.is_configuration_error()));
    }
}
