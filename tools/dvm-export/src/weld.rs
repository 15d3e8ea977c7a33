//! Vertex welder
//!
//! Turns a list of polygons, whose corners each carry their own attribute
//! values, into an indexed triangle mesh with as few vertices as possible.
//!
//! Two corners of the same position share a vertex when every enabled
//! attribute category is bit-identical. The output order is a wire contract:
//! positions ascending, and within a position the order in which distinct
//! corners were first seen.

use dvm_common::ExportFlags;
use hashbrown::HashMap;

use crate::scene::{Corner, Polygon};

const TRIANGLE: &[[usize; 3]] = &[[0, 1, 2]];
const QUAD: &[[usize; 3]] = &[[0, 1, 2], [2, 3, 0]];

/// Polygon-level input the welder cannot handle
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeldError {
    /// Only triangles and quads are accepted
    #[error("polygon {polygon} has {corners} corners (only triangles and quads are supported)")]
    UnsupportedPolygon { polygon: usize, corners: usize },

    /// The same position appears twice in one polygon
    #[error("polygon {polygon} uses position {position} more than once")]
    RepeatedPosition { polygon: usize, position: u32 },
}

/// One emitted vertex row
#[derive(Debug, Clone, Copy)]
pub struct WeldedVertex<'a> {
    pub position: u32,
    /// First corner that produced this vertex; every welded corner is
    /// bit-identical to it in the enabled categories
    pub corner: &'a Corner,
    pub material_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle {
    pub indices: [u32; 3],
    /// Source polygon
    pub polygon: usize,
    pub material_index: u32,
}

#[derive(Debug, Clone)]
pub struct WeldedMesh<'a> {
    pub vertices: Vec<WeldedVertex<'a>>,
    pub triangles: Vec<Triangle>,
    /// Output vertex of every corner, polygons and corners in input order
    pub corner_vertices: Vec<u32>,
}

impl WeldedMesh<'_> {
    /// Triangle indices flattened for the index buffer
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.triangles.iter().flat_map(|t| t.indices)
    }
}

/// Corner triples for a polygon with `corners` corners.
///
/// A quad `[A, B, C, D]` splits into `[A, B, C]` and `[C, D, A]`.
pub fn triangulate(corners: usize) -> Option<&'static [[usize; 3]]> {
    match corners {
        3 => Some(TRIANGLE),
        4 => Some(QUAD),
        _ => None,
    }
}

/// Weld `polygons` into deduplicated vertex and triangle arrays.
pub fn weld(polygons: &[Polygon], flags: ExportFlags) -> Result<WeldedMesh<'_>, WeldError> {
    for (index, polygon) in polygons.iter().enumerate() {
        check_polygon(index, polygon)?;
    }

    // Candidate arena plus, per position, the arena slots in discovery order
    let mut arena: Vec<WeldedVertex<'_>> = Vec::new();
    let mut groups: HashMap<u32, Vec<usize>> = HashMap::new();
    let mut corner_slots = Vec::with_capacity(polygons.iter().map(|p| p.corners.len()).sum());

    for polygon in polygons {
        for corner in &polygon.corners {
            let group = groups.entry(corner.position).or_default();
            let existing = group
                .iter()
                .copied()
                .find(|&slot| same_vertex(&arena[slot], corner, polygon.material_index, flags));

            let slot = match existing {
                Some(slot) => slot,
                None => {
                    arena.push(WeldedVertex {
                        position: corner.position,
                        corner,
                        material_index: polygon.material_index,
                    });
                    group.push(arena.len() - 1);
                    arena.len() - 1
                }
            };
            corner_slots.push(slot);
        }
    }

    let mut positions: Vec<u32> = groups.keys().copied().collect();
    positions.sort_unstable();

    let mut output_index = vec![0u32; arena.len()];
    let mut vertices = Vec::with_capacity(arena.len());
    for position in positions {
        for &slot in &groups[&position] {
            output_index[slot] = vertices.len() as u32;
            vertices.push(arena[slot]);
        }
    }

    let corner_vertices: Vec<u32> = corner_slots.iter().map(|&slot| output_index[slot]).collect();

    let mut triangles = Vec::with_capacity(polygons.len() * 2);
    let mut offset = 0;
    for (index, polygon) in polygons.iter().enumerate() {
        let count = polygon.corners.len();
        let local = &corner_vertices[offset..offset + count];
        // Shape was checked above
        for tri in triangulate(count).unwrap_or_default() {
            triangles.push(Triangle {
                indices: tri.map(|c| local[c]),
                polygon: index,
                material_index: polygon.material_index,
            });
        }
        offset += count;
    }

    Ok(WeldedMesh {
        vertices,
        triangles,
        corner_vertices,
    })
}

fn check_polygon(index: usize, polygon: &Polygon) -> Result<(), WeldError> {
    let corners = &polygon.corners;
    if triangulate(corners.len()).is_none() {
        return Err(WeldError::UnsupportedPolygon {
            polygon: index,
            corners: corners.len(),
        });
    }
    for (i, corner) in corners.iter().enumerate() {
        if corners[..i].iter().any(|c| c.position == corner.position) {
            return Err(WeldError::RepeatedPosition {
                polygon: index,
                position: corner.position,
            });
        }
    }
    Ok(())
}

/// Corner equality over the enabled categories.
///
/// Skin groups live on the position, so they never split a position group.
fn same_vertex(
    vertex: &WeldedVertex<'_>,
    corner: &Corner,
    material_index: u32,
    flags: ExportFlags,
) -> bool {
    let a = vertex.corner;

    if flags.contains(ExportFlags::NORMALS) && !bits_eq(&a.normal, &corner.normal) {
        return false;
    }
    if flags.contains(ExportFlags::TANGENTS) {
        let same = match (&a.tangent, &corner.tangent) {
            (Some(x), Some(y)) => bits_eq(x, y),
            (None, None) => true,
            _ => false,
        };
        if !same {
            return false;
        }
    }
    if !bits_eq(a.uvs.as_flattened(), corner.uvs.as_flattened()) {
        return false;
    }
    if !bits_eq(a.colors.as_flattened(), corner.colors.as_flattened()) {
        return false;
    }
    if flags.contains(ExportFlags::MATERIAL_INDICES) && vertex.material_index != material_index {
        return false;
    }
    true
}

#[inline]
fn bits_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;

    const UP: [f32; 3] = [0.0, 0.0, 1.0];

    fn corner(position: u32, normal: [f32; 3], uv: [f32; 2]) -> Corner {
        Corner {
            position,
            normal,
            tangent: None,
            uvs: vec![uv],
            colors: Vec::new(),
        }
    }

    fn polygon(corners: Vec<Corner>, material_index: u32) -> Polygon {
        Polygon {
            corners,
            material_index,
        }
    }

    fn flat(positions: &[u32], material_index: u32) -> Polygon {
        polygon(
            positions.iter().map(|&p| corner(p, UP, [0.0, 0.0])).collect(),
            material_index,
        )
    }

    fn assert_coverage(mesh: &WeldedMesh<'_>) {
        // Every vertex is referenced by at least one corner
        for i in 0..mesh.vertices.len() as u32 {
            assert!(mesh.corner_vertices.contains(&i), "vertex {i} unreferenced");
        }
        for &v in &mesh.corner_vertices {
            assert!((v as usize) < mesh.vertices.len());
        }
    }

    #[test]
    fn test_single_triangle() {
        let polys = vec![flat(&[0, 1, 2], 0)];
        let mesh = weld(&polys, ExportFlags::NORMALS).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangles.len(), 1);
        assert_eq!(mesh.triangles[0].indices, [0, 1, 2]);
    }

    #[test]
    fn test_quad_splits_abc_cda() {
        let polys = vec![flat(&[0, 1, 2, 3], 0)];
        let mesh = weld(&polys, ExportFlags::NORMALS).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.triangles[0].indices, [0, 1, 2]);
        assert_eq!(mesh.triangles[1].indices, [2, 3, 0]);
        assert!(mesh.triangles.iter().all(|t| t.polygon == 0));
    }

    #[test]
    fn test_shared_edge_with_equal_attributes_welds() {
        let polys = vec![flat(&[0, 1, 2], 0), flat(&[2, 1, 3], 0)];
        let mesh = weld(&polys, ExportFlags::NORMALS).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.corner_vertices, vec![0, 1, 2, 2, 1, 3]);
        assert_coverage(&mesh);
    }

    #[test]
    fn test_hard_edge_splits_only_when_normals_enabled() {
        let side = [1.0, 0.0, 0.0];
        let polys = vec![
            polygon(
                vec![corner(0, UP, [0.0; 2]), corner(1, UP, [0.0; 2]), corner(2, UP, [0.0; 2])],
                0,
            ),
            polygon(
                vec![
                    corner(2, side, [0.0; 2]),
                    corner(1, side, [0.0; 2]),
                    corner(3, side, [0.0; 2]),
                ],
                0,
            ),
        ];

        let mesh = weld(&polys, ExportFlags::NORMALS).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
        assert_coverage(&mesh);

        let mesh = weld(&polys, ExportFlags::empty()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
    }

    #[test]
    fn test_uv_seam_always_splits() {
        let polys = vec![
            polygon(
                vec![
                    corner(0, UP, [0.0, 0.0]),
                    corner(1, UP, [1.0, 0.0]),
                    corner(2, UP, [1.0, 1.0]),
                ],
                0,
            ),
            polygon(
                vec![
                    corner(0, UP, [0.5, 0.0]),
                    corner(2, UP, [1.0, 1.0]),
                    corner(3, UP, [0.0, 1.0]),
                ],
                0,
            ),
        ];
        let mesh = weld(&polys, ExportFlags::empty()).unwrap();
        // Position 0 appears with two different UVs
        assert_eq!(mesh.vertices.len(), 5);
        assert_eq!(mesh.vertices[0].position, 0);
        assert_eq!(mesh.vertices[1].position, 0);
        assert_eq!(mesh.vertices[1].corner.uvs[0], [0.5, 0.0]);
    }

    #[test]
    fn test_color_layers_split() {
        let mut a = corner(0, UP, [0.0; 2]);
        a.colors = vec![[1.0, 0.0, 0.0]];
        let mut b = corner(0, UP, [0.0; 2]);
        b.colors = vec![[0.0, 1.0, 0.0]];
        let rest = |p| {
            let mut c = corner(p, UP, [0.0; 2]);
            c.colors = vec![[1.0, 0.0, 0.0]];
            c
        };
        let polys = vec![
            polygon(vec![a, rest(1), rest(2)], 0),
            polygon(vec![b, rest(2), rest(3)], 0),
        ];
        let mesh = weld(&polys, ExportFlags::empty()).unwrap();
        assert_eq!(mesh.vertices.len(), 5);
    }

    #[test]
    fn test_tangents_compared_only_when_enabled() {
        let mut a = corner(0, UP, [0.0; 2]);
        a.tangent = Some([1.0, 0.0, 0.0]);
        let mut b = corner(0, UP, [0.0; 2]);
        b.tangent = Some([0.0, 1.0, 0.0]);
        let polys = vec![
            polygon(vec![a, corner(1, UP, [0.0; 2]), corner(2, UP, [0.0; 2])], 0),
            polygon(vec![b, corner(2, UP, [0.0; 2]), corner(3, UP, [0.0; 2])], 0),
        ];
        assert_eq!(weld(&polys, ExportFlags::NORMALS).unwrap().vertices.len(), 4);
        assert_eq!(
            weld(&polys, ExportFlags::NORMALS | ExportFlags::TANGENTS)
                .unwrap()
                .vertices
                .len(),
            5
        );
    }

    #[test]
    fn test_material_index_splits_only_when_enabled() {
        let polys = vec![flat(&[0, 1, 2], 0), flat(&[2, 1, 3], 1)];

        let mesh = weld(&polys, ExportFlags::NORMALS).unwrap();
        assert_eq!(mesh.vertices.len(), 4);

        let mesh = weld(&polys, ExportFlags::NORMALS | ExportFlags::MATERIAL_INDICES).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.triangles[1].material_index, 1);
        for tri in &mesh.triangles {
            for &i in &tri.indices {
                assert_eq!(mesh.vertices[i as usize].material_index, tri.material_index);
            }
        }
    }

    #[test]
    fn test_groups_never_split_a_position() {
        let polys = vec![flat(&[0, 1, 2], 0), flat(&[2, 1, 3], 0)];
        let mesh = weld(&polys, ExportFlags::NORMALS | ExportFlags::GROUPS).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
    }

    #[test]
    fn test_exact_float_policy() {
        // -0.0 and 0.0 compare equal as floats but not as bits
        let polys = vec![
            polygon(
                vec![
                    corner(0, [0.0, 0.0, 1.0], [0.0; 2]),
                    corner(1, UP, [0.0; 2]),
                    corner(2, UP, [0.0; 2]),
                ],
                0,
            ),
            polygon(
                vec![
                    corner(0, [-0.0, 0.0, 1.0], [0.0; 2]),
                    corner(2, UP, [0.0; 2]),
                    corner(3, UP, [0.0; 2]),
                ],
                0,
            ),
        ];
        assert_eq!(weld(&polys, ExportFlags::NORMALS).unwrap().vertices.len(), 5);

        let polys = vec![
            polygon(
                vec![corner(0, UP, [0.5, 0.5]), corner(1, UP, [0.0; 2]), corner(2, UP, [0.0; 2])],
                0,
            ),
            polygon(
                vec![
                    corner(0, UP, [0.5 + 1e-7, 0.5]),
                    corner(2, UP, [0.0; 2]),
                    corner(3, UP, [0.0; 2]),
                ],
                0,
            ),
        ];
        assert_eq!(weld(&polys, ExportFlags::NORMALS).unwrap().vertices.len(), 5);
    }

    #[test]
    fn test_position_major_ordering() {
        // Corners arrive in descending position order
        let polys = vec![flat(&[2, 1, 0], 0)];
        let mesh = weld(&polys, ExportFlags::NORMALS).unwrap();
        let positions: Vec<u32> = mesh.vertices.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(mesh.triangles[0].indices, [2, 1, 0]);
    }

    #[test]
    fn test_discovery_order_within_position() {
        let polys = vec![
            polygon(
                vec![corner(1, UP, [0.1, 0.0]), corner(2, UP, [0.0; 2]), corner(3, UP, [0.0; 2])],
                0,
            ),
            polygon(
                vec![corner(1, UP, [0.2, 0.0]), corner(3, UP, [0.0; 2]), corner(0, UP, [0.0; 2])],
                0,
            ),
            polygon(
                vec![corner(1, UP, [0.1, 0.0]), corner(0, UP, [0.0; 2]), corner(4, UP, [0.0; 2])],
                0,
            ),
        ];
        let mesh = weld(&polys, ExportFlags::NORMALS).unwrap();
        // position 0, then position 1 (uv 0.1 first, 0.2 second), then 2, 3, 4
        assert_eq!(mesh.vertices[0].position, 0);
        assert_eq!(mesh.vertices[1].corner.uvs[0], [0.1, 0.0]);
        assert_eq!(mesh.vertices[2].corner.uvs[0], [0.2, 0.0]);
        assert_eq!(mesh.vertices.len(), 6);
        // Third polygon's first corner welds back to the first uv
        assert_eq!(mesh.corner_vertices[6], 1);
        assert_coverage(&mesh);
    }

    #[test]
    fn test_unused_positions_emit_nothing() {
        let polys = vec![flat(&[5, 7, 9], 0)];
        let mesh = weld(&polys, ExportFlags::NORMALS).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangles[0].indices, [0, 1, 2]);
    }

    #[test]
    fn test_rejects_ngons_and_degenerates() {
        let err = weld(&[flat(&[0, 1, 2, 3, 4], 0)], ExportFlags::NORMALS).unwrap_err();
        assert_eq!(err, WeldError::UnsupportedPolygon { polygon: 0, corners: 5 });

        let err = weld(&[flat(&[0, 1, 2], 0), flat(&[0, 1], 0)], ExportFlags::NORMALS).unwrap_err();
        assert_eq!(err, WeldError::UnsupportedPolygon { polygon: 1, corners: 2 });

        let err = weld(&[flat(&[0, 1, 0], 0)], ExportFlags::NORMALS).unwrap_err();
        assert_eq!(err, WeldError::RepeatedPosition { polygon: 0, position: 0 });
    }

    #[test]
    fn test_empty_input() {
        let mesh = weld(&[], ExportFlags::all()).unwrap();
        assert!(mesh.vertices.is_empty());
        assert!(mesh.triangles.is_empty());
    }
}
