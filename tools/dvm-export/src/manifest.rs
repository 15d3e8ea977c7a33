//! dvm.toml manifest parsing
//!
//! ```toml
//! [output]
//! dir = "build"
//!
//! [[scenes]]
//! id = "level1"
//! path = "scenes/level1.glb"
//! output = "levels/level1.dvm"   # optional, defaults to "<id>.dvm"
//!
//! [meshes.Rock]
//! flags = "NORMALS|TANGENTS"      # optional, replaces all four toggles
//! groups = true                   # individual toggles apply after `flags`
//! tangent_uv_source = "UVMap"
//! ```

use anyhow::{Context, Result};
use dvm_common::{ExportFlags, FormatError, DVM_EXT};
use hashbrown::{HashMap, HashSet};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::scene::{Document, MeshOptions};

/// dvm.toml manifest structure
#[derive(Debug, Default, Deserialize)]
pub struct DvmManifest {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
    /// Per-mesh option overrides, keyed by mesh name
    #[serde(default)]
    pub meshes: HashMap<String, MeshOverride>,
}

#[derive(Debug, Deserialize)]
pub struct OutputSection {
    /// Output directory, relative to the manifest
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "build".to_string()
}

/// Single scene to export
#[derive(Debug, Deserialize)]
pub struct SceneEntry {
    pub id: String,
    /// Input scene (.json, .gltf or .glb), relative to the manifest
    pub path: String,
    /// Output file, relative to the output directory
    #[serde(default)]
    pub output: Option<String>,
}

/// Host-side mesh option overrides
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MeshOverride {
    #[serde(default)]
    pub flags: Option<String>,
    #[serde(default)]
    pub normals: Option<bool>,
    #[serde(default)]
    pub tangents: Option<bool>,
    #[serde(default)]
    pub groups: Option<bool>,
    #[serde(default)]
    pub material_indices: Option<bool>,
    #[serde(default)]
    pub tangent_uv_source: Option<String>,
}

impl MeshOverride {
    pub fn apply(&self, options: &mut MeshOptions) -> Result<(), FormatError> {
        if let Some(flags) = &self.flags {
            options.set_flags(ExportFlags::parse(flags)?);
        }
        if let Some(v) = self.normals {
            options.normals = v;
        }
        if let Some(v) = self.tangents {
            options.tangents = v;
        }
        if let Some(v) = self.groups {
            options.groups = v;
        }
        if let Some(v) = self.material_indices {
            options.material_indices = v;
        }
        if let Some(source) = &self.tangent_uv_source {
            options.tangent_uv_source = Some(source.clone());
        }
        Ok(())
    }
}

impl DvmManifest {
    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse dvm.toml")
    }

    /// Validate manifest fields
    pub fn validate(&self) -> Result<()> {
        if self.scenes.is_empty() {
            anyhow::bail!("No scenes declared in dvm.toml (add a [[scenes]] entry)");
        }

        let mut ids = HashSet::new();
        let mut outputs = HashSet::new();
        for entry in &self.scenes {
            if entry.id.trim().is_empty() {
                anyhow::bail!("Scene with path '{}' has an empty id", entry.path);
            }
            if entry.path.trim().is_empty() {
                anyhow::bail!("Scene '{}' has an empty path", entry.id);
            }
            if !ids.insert(entry.id.as_str()) {
                anyhow::bail!("Duplicate scene id '{}' in dvm.toml", entry.id);
            }
            let output = self.output_name(entry);
            if !outputs.insert(output.clone()) {
                anyhow::bail!(
                    "Scene '{}' writes to '{}', which another scene already uses",
                    entry.id,
                    output
                );
            }
        }

        for (name, over) in &self.meshes {
            if let Some(flags) = &over.flags {
                ExportFlags::parse(flags)
                    .with_context(|| format!("Invalid flags for mesh '{}'", name))?;
            }
        }
        Ok(())
    }

    /// Output file name of a scene, relative to the output directory
    pub fn output_name(&self, entry: &SceneEntry) -> String {
        entry
            .output
            .clone()
            .unwrap_or_else(|| format!("{}.{}", entry.id, DVM_EXT))
    }

    /// Resolve the output path of a scene. `out_dir` replaces `[output] dir`.
    pub fn output_path(
        &self,
        entry: &SceneEntry,
        project_dir: &Path,
        out_dir: Option<&Path>,
    ) -> PathBuf {
        let dir = match out_dir {
            Some(dir) => dir.to_path_buf(),
            None => project_dir.join(&self.output.dir),
        };
        dir.join(self.output_name(entry))
    }

    /// Apply mesh overrides to every matching mesh of `doc`. Returns how many
    /// meshes were changed.
    pub fn apply_overrides(&self, doc: &mut Document) -> Result<usize> {
        let mut applied = 0;
        for mesh in &mut doc.meshes {
            if let Some(over) = self.meshes.get(&mesh.name) {
                over.apply(&mut mesh.options)
                    .with_context(|| format!("Invalid flags for mesh '{}'", mesh.name))?;
                applied += 1;
            }
        }
        Ok(applied)
    }
}
