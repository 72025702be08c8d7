//! Shared fixtures for building model directories on disk

#![allow(dead_code)]

use serde_json::Value;
use std::path::Path;

pub const INDEX_FILE: &str = "model.safetensors.index.json";
pub const SINGLE_FILE: &str = "model.safetensors";

/// Write a shard file containing only a header (and optional zero payload)
pub fn write_shard(dir: &Path, name: &str, header: &Value, payload_len: usize) {
    let json = serde_json::to_vec(header).expect("Failed to serialize header");
    let mut bytes = (json.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(&json);
    bytes.resize(bytes.len() + payload_len, 0);
    std::fs::write(dir.join(name), bytes).expect("Failed to write shard");
}

/// Write `model.safetensors.index.json` with the given weight map
pub fn write_index(dir: &Path, weight_map: &Value) {
    let index = serde_json::json!({ "metadata": {}, "weight_map": weight_map });
    std::fs::write(
        dir.join(INDEX_FILE),
        serde_json::to_vec_pretty(&index).expect("Failed to serialize index"),
    )
    .expect("Failed to write index");
}
