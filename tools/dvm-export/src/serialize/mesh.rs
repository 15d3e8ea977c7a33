//! Mesh preparation and the mesh record
//!
//! Preparation resolves the effective export flags (dropping tangents the
//! mesh cannot provide) and welds the polygons. It touches nothing but the
//! mesh itself, so meshes are prepared in parallel before writing starts.

use std::io::Write;

use dvm_common::{EntityKind, ExportFlags, WriteDvmExt, NO_REFERENCE};
use tracing::{debug, warn};

use super::{Context, ExportWarning, Record};
use crate::error::ExportError;
use crate::scene::Mesh;
use crate::weld::{weld, WeldedMesh};

/// A welded mesh ready to be written
#[derive(Debug)]
pub(crate) struct PreparedMesh<'d> {
    pub mesh: &'d Mesh,
    /// Flags actually written, after degradation
    pub flags: ExportFlags,
    pub welded: WeldedMesh<'d>,
    /// Group slots per vertex, 0 when groups are off
    pub group_width: usize,
    pub warning: Option<ExportWarning>,
}

/// Resolve flags and weld one mesh.
pub(crate) fn prepare_mesh(mesh: &Mesh) -> Result<PreparedMesh<'_>, ExportError> {
    // Record writing indexes `positions` by corner
    for (polygon, p) in mesh.polygons.iter().enumerate() {
        if let Some(corner) = p
            .corners
            .iter()
            .find(|c| c.position as usize >= mesh.positions.len())
        {
            return Err(ExportError::PositionOutOfRange {
                mesh: mesh.name.clone(),
                polygon,
                position: corner.position,
                count: mesh.positions.len(),
            });
        }
    }

    let mut flags = mesh.options.flags();
    let mut warning = None;

    if flags.contains(ExportFlags::TANGENTS) {
        if let Some(reason) = tangent_problem(mesh) {
            warn!(mesh = %mesh.name, "{reason}, exporting without tangents");
            flags.remove(ExportFlags::TANGENTS);
            warning = Some(ExportWarning::TangentsDropped {
                mesh: mesh.name.clone(),
                reason,
            });
        }
    }

    let welded = weld(&mesh.polygons, flags).map_err(|source| ExportError::Weld {
        mesh: mesh.name.clone(),
        source,
    })?;

    let group_width = if flags.contains(ExportFlags::GROUPS) {
        welded
            .vertices
            .iter()
            .map(|v| mesh.positions[v.position as usize].groups.len())
            .max()
            .unwrap_or(0)
    } else {
        0
    };

    debug!(
        mesh = %mesh.name,
        corners = welded.corner_vertices.len(),
        vertices = welded.vertices.len(),
        triangles = welded.triangles.len(),
        "welded"
    );

    Ok(PreparedMesh {
        mesh,
        flags,
        welded,
        group_width,
        warning,
    })
}

/// Why tangents can't be exported for `mesh`, if they can't
fn tangent_problem(mesh: &Mesh) -> Option<String> {
    if mesh.uv_layers.is_empty() {
        return Some("mesh has no UV layers".to_string());
    }
    if let Some(source) = &mesh.options.tangent_uv_source {
        if !mesh.uv_layers.contains(source) {
            return Some(format!("tangent UV source '{source}' does not exist"));
        }
    }
    let missing = mesh
        .polygons
        .iter()
        .flat_map(|p| &p.corners)
        .any(|c| c.tangent.is_none());
    if missing {
        return Some("some corners have no tangent data".to_string());
    }
    None
}

impl Record for Mesh {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        ctx: &Context<'_>,
        position: usize,
    ) -> Result<(), ExportError> {
        let prepared = &ctx.meshes[position];
        let vertices = &prepared.welded.vertices;
        let flags = prepared.flags;

        w.write_text(&self.name)?;
        w.write_int(flags.to_wire())?;

        w.write_len(self.uv_layers.len())?;
        for name in &self.uv_layers {
            w.write_text(name)?;
        }
        w.write_len(self.color_layers.len())?;
        for name in &self.color_layers {
            w.write_text(name)?;
        }
        w.write_len(prepared.group_width)?;
        w.write_len(vertices.len())?;

        for v in vertices {
            w.write_vec3(self.positions[v.position as usize].co)?;
        }
        if flags.contains(ExportFlags::NORMALS) {
            for v in vertices {
                w.write_vec3(v.corner.normal)?;
            }
        }
        if flags.contains(ExportFlags::TANGENTS) {
            for v in vertices {
                w.write_vec3(v.corner.tangent.unwrap_or_default())?;
            }
        }
        for layer in 0..self.uv_layers.len() {
            for v in vertices {
                w.write_floats(&v.corner.uvs[layer])?;
            }
        }
        for layer in 0..self.color_layers.len() {
            for v in vertices {
                w.write_floats(&v.corner.colors[layer])?;
            }
        }

        let width = prepared.group_width;
        if width > 0 {
            for v in vertices {
                let groups = &self.positions[v.position as usize].groups;
                for slot in 0..width {
                    w.write_int(groups.get(slot).map_or(NO_REFERENCE, |g| g.group))?;
                }
            }
            for v in vertices {
                let groups = &self.positions[v.position as usize].groups;
                for slot in 0..width {
                    w.write_float(groups.get(slot).map_or(0.0, |g| g.weight))?;
                }
            }
        }

        if flags.contains(ExportFlags::MATERIAL_INDICES) {
            for v in vertices {
                w.write_len(v.material_index as usize)?;
            }
        }

        w.write_len(prepared.welded.triangles.len())?;
        for index in prepared.welded.indices() {
            w.write_len(index as usize)?;
        }

        w.write_len(self.materials.len())?;
        for slot in &self.materials {
            w.write_int(ctx.index.local_index(EntityKind::Material, slot.as_ref())?)?;
        }
        Ok(())
    }
}
