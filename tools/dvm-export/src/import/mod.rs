//! Scene loaders
//!
//! - `.json` - a serialized [`Document`]
//! - `.gltf` / `.glb` - converted from glTF 2.0

mod gltf;

pub use self::gltf::import_gltf;

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::scene::Document;

/// Load a scene from any supported input format, picked by extension.
pub fn load_document(path: &Path) -> Result<Document> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => load_json(path),
        "gltf" | "glb" => import_gltf(path),
        _ => bail!(
            "Unsupported scene format '{}' for {:?} (expected .json, .gltf or .glb)",
            ext,
            path
        ),
    }
}

/// Load a JSON scene description
pub fn load_json(path: &Path) -> Result<Document> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to read scene: {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse scene: {:?}", path))
}
