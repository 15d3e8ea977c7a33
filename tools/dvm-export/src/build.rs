//! Batch export of every scene in a manifest

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::import::load_document;
use crate::manifest::{DvmManifest, SceneEntry};
use crate::scene::Document;
use crate::serialize::{self, ExportReport, ExportWarning};

/// One exported scene
#[derive(Debug)]
pub struct BuiltScene {
    pub id: String,
    pub output: PathBuf,
    pub report: ExportReport,
}

/// Export every scene of the manifest at `manifest_path`.
///
/// Scene paths are relative to the manifest's directory. `out_dir` replaces
/// the manifest's `[output] dir`.
pub fn build_all(manifest_path: &Path, out_dir: Option<&Path>) -> Result<Vec<BuiltScene>> {
    let manifest = DvmManifest::load(manifest_path)?;
    manifest.validate()?;
    let project_dir = project_dir(manifest_path);

    let mut built = Vec::with_capacity(manifest.scenes.len());
    for entry in &manifest.scenes {
        let doc = load_scene(&manifest, entry, project_dir)?;
        let output = manifest.output_path(entry, project_dir, out_dir);
        let report = serialize::export(&doc, &output)
            .with_context(|| format!("Failed to export scene '{}'", entry.id))?;

        tracing::info!(
            "Built scene '{}' -> {} ({} bytes)",
            entry.id,
            output.display(),
            report.bytes
        );
        built.push(BuiltScene {
            id: entry.id.clone(),
            output,
            report,
        });
    }
    Ok(built)
}

/// Load and check every scene of a manifest without writing anything.
/// Returns the degraded-feature warnings per scene id.
pub fn check_all(manifest_path: &Path) -> Result<Vec<(String, Vec<ExportWarning>)>> {
    let manifest = DvmManifest::load(manifest_path)?;
    manifest.validate()?;
    let project_dir = project_dir(manifest_path);

    manifest
        .scenes
        .iter()
        .map(|entry| {
            let doc = load_scene(&manifest, entry, project_dir)?;
            let warnings = serialize::check(&doc)
                .with_context(|| format!("Scene '{}' cannot be exported", entry.id))?;
            Ok((entry.id.clone(), warnings))
        })
        .collect()
}

fn load_scene(manifest: &DvmManifest, entry: &SceneEntry, project_dir: &Path) -> Result<Document> {
    let input = project_dir.join(&entry.path);
    let mut doc = load_document(&input)
        .with_context(|| format!("Failed to load scene '{}'", entry.id))?;
    let applied = manifest
        .apply_overrides(&mut doc)
        .with_context(|| format!("Scene '{}'", entry.id))?;
    if applied > 0 {
        tracing::debug!("Scene '{}': applied {} mesh overrides", entry.id, applied);
    }
    Ok(doc)
}

fn project_dir(manifest_path: &Path) -> &Path {
    match manifest_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SCENE: &str = r#"{
        "meshes": [{
            "name": "Tri",
            "positions": [{"co": [0, 0, 0]}, {"co": [1, 0, 0]}, {"co": [0, 1, 0]}],
            "polygons": [{"corners": [
                {"position": 0, "normal": [0, 0, 1]},
                {"position": 1, "normal": [0, 0, 1]},
                {"position": 2, "normal": [0, 0, 1]}
            ]}]
        }]
    }"#;

    #[test]
    fn test_build_all_writes_each_scene() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tri.json"), SCENE).unwrap();
        fs::write(
            dir.path().join("dvm.toml"),
            r#"
[[scenes]]
id = "tri"
path = "tri.json"

[meshes.Tri]
tangents = true
"#,
        )
        .unwrap();

        let built = build_all(&dir.path().join("dvm.toml"), None).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].output, dir.path().join("build").join("tri.dvm"));
        assert!(built[0].output.exists());
        // Tangents requested without UV layers degrade to a warning
        assert_eq!(built[0].report.warnings.len(), 1);
    }

    #[test]
    fn test_check_all_reports_bad_scene() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bad.json"),
            r#"{"scenes": [{"name": "S", "objects": [{"name": "Ghost"}]}]}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("dvm.toml"),
            r#"
[[scenes]]
id = "bad"
path = "bad.json"
"#,
        )
        .unwrap();

        let err = check_all(&dir.path().join("dvm.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("Ghost"));
        assert!(!dir.path().join("build").exists());
    }
}
