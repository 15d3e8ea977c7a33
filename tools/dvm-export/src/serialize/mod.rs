//! Scene serializer
//!
//! Writes a validated [`Document`] as a DevilModel container:
//!
//! ```text
//! header (16 bytes)
//! for each kind in section order:
//!     tag:int32
//!     block { count:int32, records... }
//! ```
//!
//! Only local entities get a record; record `i` of a section is the entity
//! the index map numbered `i`. Meshes are welded up front (in parallel by
//! default) so the write pass itself never fails on mesh content.

mod mesh;
mod object;
mod records;
#[cfg(test)]
pub(crate) mod testing;

pub(crate) use mesh::{prepare_mesh, PreparedMesh};

use std::fmt;
use std::fs;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use dvm_common::{BlockWriter, ContainerHeader, EntityKind, WriteDvmExt};
use rayon::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::index_map::EntityIndexMap;
use crate::scene::{self, Document, Entity};

/// Knobs for a single export
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Weld meshes on the rayon pool instead of the calling thread
    pub parallel: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// A feature dropped from the output without failing the export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportWarning {
    TangentsDropped { mesh: String, reason: String },
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportWarning::TangentsDropped { mesh, reason } => {
                write!(f, "mesh '{mesh}': {reason}, exported without tangents")
            }
        }
    }
}

/// Summary of a finished export
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Records written per section, in section order
    pub sections: Vec<(EntityKind, usize)>,
    pub vertices: usize,
    pub triangles: usize,
    pub bytes: u64,
    pub warnings: Vec<ExportWarning>,
}

impl ExportReport {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.sections
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(0, |(_, n)| *n)
    }
}

/// Everything records need besides themselves
pub(crate) struct Context<'d> {
    pub index: EntityIndexMap<'d>,
    /// Prepared local meshes, in mesh-section order
    pub meshes: Vec<PreparedMesh<'d>>,
}

/// One entity kind's record writer
pub(crate) trait Record: Entity {
    /// Write the record of the entity at `position` in its section
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        ctx: &Context<'_>,
        position: usize,
    ) -> Result<(), ExportError>;
}

/// Export `doc` to `path` with default options.
pub fn export(doc: &Document, path: &Path) -> Result<ExportReport, ExportError> {
    export_with(doc, path, &ExportOptions::default())
}

/// Export `doc` to `path`.
///
/// The container is written to a temporary file next to `path` and renamed
/// over it only once complete; on any error nothing is left behind.
pub fn export_with(
    doc: &Document,
    path: &Path,
    options: &ExportOptions,
) -> Result<ExportReport, ExportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    let report = {
        let mut sink = BufWriter::new(tmp.as_file_mut());
        write_document(doc, &mut sink, options)?
    };
    tmp.persist(path).map_err(|e| ExportError::Io(e.error))?;

    info!(
        path = %path.display(),
        bytes = report.bytes,
        vertices = report.vertices,
        triangles = report.triangles,
        warnings = report.warnings.len(),
        "exported"
    );
    Ok(report)
}

/// Validate, weld and write `doc` to a seekable sink.
pub fn write_document<W: Write + Seek>(
    doc: &Document,
    sink: &mut W,
    options: &ExportOptions,
) -> Result<ExportReport, ExportError> {
    let ctx = prepare(doc, options)?;

    let mut w = BlockWriter::new(sink)?;
    let start = w.position();
    w.write_all(&ContainerHeader::new().to_bytes())?;

    let mut report = ExportReport {
        warnings: ctx.meshes.iter().filter_map(|m| m.warning.clone()).collect(),
        vertices: ctx.meshes.iter().map(|m| m.welded.vertices.len()).sum(),
        triangles: ctx.meshes.iter().map(|m| m.welded.triangles.len()).sum(),
        ..Default::default()
    };

    for kind in EntityKind::ORDER {
        let count = match kind {
            EntityKind::Library => write_section(&mut w, &ctx, &doc.libraries)?,
            EntityKind::Action => write_section(&mut w, &ctx, &doc.actions)?,
            EntityKind::Armature => write_section(&mut w, &ctx, &doc.armatures)?,
            EntityKind::Curve => write_section(&mut w, &ctx, &doc.curves)?,
            EntityKind::Lamp => write_section(&mut w, &ctx, &doc.lamps)?,
            EntityKind::Material => write_section(&mut w, &ctx, &doc.materials)?,
            EntityKind::Mesh => write_section(&mut w, &ctx, &doc.meshes)?,
            EntityKind::Object => write_section(&mut w, &ctx, &doc.objects)?,
            EntityKind::Scene => write_section(&mut w, &ctx, &doc.scenes)?,
        };
        report.sections.push((kind, count));
    }

    report.bytes = w.position() - start;
    w.finish()?;
    Ok(report)
}

/// Validate `doc`, number its entities and weld its local meshes.
pub(crate) fn prepare<'d>(
    doc: &'d Document,
    options: &ExportOptions,
) -> Result<Context<'d>, ExportError> {
    scene::validate(doc)?;
    let index = EntityIndexMap::assign(doc);

    let local: Vec<_> = doc.meshes.iter().filter(|m| m.is_local()).collect();
    let meshes = if options.parallel {
        local
            .par_iter()
            .map(|&m| prepare_mesh(m))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        local
            .iter()
            .map(|&m| prepare_mesh(m))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Context { index, meshes })
}

/// Check a document the way an export would, without writing anything.
pub fn check(doc: &Document) -> Result<Vec<ExportWarning>, ExportError> {
    let ctx = prepare(doc, &ExportOptions::default())?;
    Ok(ctx.meshes.into_iter().filter_map(|m| m.warning).collect())
}

fn write_section<W: Write + Seek, E: Record>(
    w: &mut BlockWriter<W>,
    ctx: &Context<'_>,
    entities: &[E],
) -> Result<usize, ExportError> {
    w.write_int(E::KIND.tag())?;
    let block = w.open()?;

    let count = ctx.index.local_count(E::KIND);
    w.write_len(count)?;

    let mut position = 0;
    for entity in entities.iter().filter(|e| e.is_local()) {
        let index = ctx.index.index_of(E::KIND, entity.name(), None);
        if index != Some(position as i32) {
            return Err(ExportError::IndexMismatch {
                kind: E::KIND,
                name: entity.name().to_string(),
                position,
                index: index.unwrap_or(-1),
            });
        }
        entity.write_record(w, ctx, position)?;
        position += 1;
    }
    debug_assert_eq!(position, count);

    w.close(block)?;
    debug!(section = %E::KIND, records = count, "section written");
    Ok(count)
}
