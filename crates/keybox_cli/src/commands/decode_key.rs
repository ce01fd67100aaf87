//! Decode-key command implementation.

use super::{hex_decode, value_to_json};
use crate::manifest::Model;
use keybox_core::KeyBoxConfig;
use serde::Serialize;
use std::path::Path;

/// A decoded key envelope.
#[derive(Debug, Serialize)]
pub struct DecodeResult {
    /// Wire type id.
    pub type_id: u32,
    /// Declared type the id names.
    pub type_name: String,
    /// Whether the envelope is key-only.
    pub key_only: bool,
    /// `(name, value)` pairs in canonical order.
    pub parts: Vec<(String, serde_json::Value)>,
}

/// Decodes hex-encoded envelope bytes against a model.
pub fn decode(model: &Model, hex: &str) -> Result<DecodeResult, Box<dyn std::error::Error>> {
    let bytes = hex_decode(hex).ok_or("Key must be hex-encoded")?;
    let registry = model.registry(KeyBoxConfig::default().instantiate_on_complete(false));
    let decoded = registry.decode_key(&bytes)?;
    let type_id = registry
        .type_id_of(&decoded.type_name)
        .ok_or("Decoded type has no id")?;

    let mut parts = Vec::with_capacity(decoded.ring.part_count());
    for (name, value) in decoded.ring.entries() {
        parts.push((name.to_string(), value_to_json(&value?)));
    }
    Ok(DecodeResult {
        type_id,
        type_name: decoded.type_name,
        key_only: decoded.key_only,
        parts,
    })
}

/// Runs the decode-key command.
pub fn run(path: &Path, hex: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let model = Model::load(path)?;
    let result = decode(&model, hex)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            let suffix = if result.key_only { " (key only)" } else { "" };
            println!("[{}] {}{}", result.type_id, result.type_name, suffix);
            for (name, value) in &result.parts {
                println!("  {name} = {value}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::encode_key::encode;
    use crate::commands::hex_encode;
    use crate::manifest::{Manifest, ORDERS};

    #[test]
    fn decodes_what_encode_produced() {
        let model = Manifest::parse(ORDERS).unwrap().compile().unwrap();
        let assignments = ["Area=south", "Client=ACME", "Number=3"].map(String::from);
        let key = encode(&model, "Quote", &assignments, false).unwrap();

        let result = decode(&model, &hex_encode(&key.encode())).unwrap();
        assert_eq!(result.type_name, "Quote");
        assert_eq!(result.type_id, 2);
        assert!(!result.key_only);
        assert_eq!(
            result.parts,
            [
                ("Area".to_string(), serde_json::json!("south")),
                ("Client".to_string(), serde_json::json!("ACME")),
                ("Number".to_string(), serde_json::json!(3)),
            ]
        );
    }

    #[test]
    fn rejects_bad_input() {
        let model = Manifest::parse(ORDERS).unwrap().compile().unwrap();
        assert!(decode(&model, "not hex").is_err());
        assert!(decode(&model, "a161248105").is_err());
    }
}
