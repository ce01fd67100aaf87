//! Encode-key command implementation.

use super::{hex_encode, parse_value};
use crate::manifest::Model;
use keybox_codec::EncodedKey;
use keybox_core::KeyBoxConfig;
use std::path::Path;

/// Builds the envelope for `type_name` from `NAME=VALUE` assignments.
pub fn encode(
    model: &Model,
    type_name: &str,
    assignments: &[String],
    key_only: bool,
) -> Result<EncodedKey, Box<dyn std::error::Error>> {
    let registry = model.registry(KeyBoxConfig::default().instantiate_on_complete(false));
    let ring = registry
        .key_ring_for_type(type_name)?
        .ok_or_else(|| format!("No key declared for {type_name}"))?;

    for assignment in assignments {
        let (name, text) = assignment
            .split_once('=')
            .ok_or_else(|| format!("Expected NAME=VALUE, found {assignment:?}"))?;
        let index = ring
            .schema()
            .index_of(name)
            .ok_or_else(|| format!("{type_name} has no key part {name}"))?;
        let value = parse_value(ring.part_type(index)?, text)
            .map_err(|message| format!("{name}: {message}"))?;
        ring.set_at(index, value)?;
    }

    Ok(registry.encode_ring(type_name, &ring, key_only)?)
}

/// Runs the encode-key command.
pub fn run(
    path: &Path,
    type_name: &str,
    assignments: &[String],
    key_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = Model::load(path)?;
    let key = encode(&model, type_name, assignments, key_only)?;
    println!("{}", hex_encode(&key.encode()));
    Ok(())
}
