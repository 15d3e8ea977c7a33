//! glTF/GLB scene conversion
//!
//! glTF is Y-up; the document model is Z-up. Points and directions map
//! `(x, y, z) -> (x, -z, y)`, scales `(x, y, z) -> (x, z, y)`, and quaternions
//! are reordered to `(w, x, -z, y)`.
//!
//! - materials: base color -> diffuse, roughness -> specular hardness
//! - meshes: all primitives merged, one material slot per primitive
//! - skins: one armature plus one armature object each
//! - nodes: one object per node that is not a joint
//! - animations: one action per (animation, animated object)

use anyhow::{bail, Context, Result};
use glam::{Mat3, Mat4, Vec4};
use gltf::animation::util::ReadOutputs;
use gltf::animation::Interpolation as GltfInterpolation;
use hashbrown::{HashMap, HashSet};
use std::path::Path;

use crate::scene::{
    identity4, Action, Armature, Bone, Corner, DataKind, DataRef, Document, EntityRef, FCurve,
    GroupWeight, Interpolation, Keyframe, Material, Mesh, MeshOptions, Object, ParentRef, Polygon,
    Pose, PoseBone, Position, Rotation, Scene,
};

/// Frames per second used to turn keyframe times into frame numbers
const FRAME_RATE: f32 = 24.0;

/// Length of a bone without children
const DEFAULT_BONE_LENGTH: f32 = 0.1;

/// Group of transform channels that are not on a bone
const OBJECT_GROUP: &str = "Object Transforms";

/// Convert a glTF/GLB file to a scene document
pub fn import_gltf(path: &Path) -> Result<Document> {
    let (gltf, buffers, _images) =
        gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;

    let mut importer = Importer::new(&gltf, &buffers);
    importer.import_materials();
    importer.import_meshes()?;
    importer.import_skins()?;
    importer.import_nodes();
    importer.import_animations()?;
    importer.import_scenes();

    let doc = importer.doc;
    tracing::info!(
        "Imported {:?}: {} meshes, {} materials, {} armatures, {} objects, {} actions, {} scenes",
        path,
        doc.meshes.len(),
        doc.materials.len(),
        doc.armatures.len(),
        doc.objects.len(),
        doc.actions.len(),
        doc.scenes.len()
    );
    Ok(doc)
}

// ============================================================================
// Coordinate conversion
// ============================================================================

fn to_z_up(v: [f32; 3]) -> [f32; 3] {
    [v[0], -v[2], v[1]]
}

fn scale_to_z_up(s: [f32; 3]) -> [f32; 3] {
    [s[0], s[2], s[1]]
}

/// glTF `(x, y, z, w)` to a Z-up `(w, x, y, z)` quaternion
fn quat_to_z_up(q: [f32; 4]) -> [f32; 4] {
    [q[3], q[0], -q[2], q[1]]
}

/// Change of basis from Y-up to Z-up
fn basis() -> Mat4 {
    Mat4::from_cols(Vec4::X, Vec4::Z, -Vec4::Y, Vec4::W)
}

fn mat_to_z_up(m: Mat4) -> Mat4 {
    let c = basis();
    c * m * c.transpose()
}

/// Row-major rows of a glam matrix
fn rows3(m: Mat3) -> [[f32; 3]; 3] {
    m.transpose().to_cols_array_2d()
}

// ============================================================================
// Importer
// ============================================================================

/// Hands out unique names, suffixing repeats with `.001`, `.002`, ...
#[derive(Default)]
struct Names(HashSet<String>);

impl Names {
    fn claim(&mut self, base: &str) -> String {
        if self.0.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}.{:03}", base, n);
            if self.0.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

struct SkinInfo {
    /// Armature object name
    object: String,
    /// Bone names in skin joint order (the order JOINTS_0 indexes)
    joint_names: Vec<String>,
}

struct Importer<'g> {
    gltf: &'g gltf::Document,
    buffers: &'g [gltf::buffer::Data],
    doc: Document,
    object_names: Names,
    /// By glTF material index
    material_names: Vec<String>,
    /// By glTF mesh index
    mesh_names: Vec<String>,
    /// By glTF skin index
    skins: Vec<SkinInfo>,
    /// Joint node -> (skin index, bone name), first skin wins
    joint_bones: HashMap<usize, (usize, String)>,
    /// Non-joint node -> object name
    node_objects: HashMap<usize, String>,
    /// Node -> parent node
    parents: HashMap<usize, usize>,
}

impl<'g> Importer<'g> {
    fn new(gltf: &'g gltf::Document, buffers: &'g [gltf::buffer::Data]) -> Self {
        let mut parents = HashMap::new();
        for node in gltf.nodes() {
            for child in node.children() {
                parents.insert(child.index(), node.index());
            }
        }
        Self {
            gltf,
            buffers,
            doc: Document::default(),
            object_names: Names::default(),
            material_names: Vec::new(),
            mesh_names: Vec::new(),
            skins: Vec::new(),
            joint_bones: HashMap::new(),
            node_objects: HashMap::new(),
            parents,
        }
    }

    fn import_materials(&mut self) {
        let mut names = Names::default();
        for (i, material) in self.gltf.materials().enumerate() {
            let base = material
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Material{}", i));
            let name = names.claim(&base);

            let pbr = material.pbr_metallic_roughness();
            let [r, g, b, _] = pbr.base_color_factor();
            let emit = material.emissive_factor().into_iter().fold(0.0, f32::max);

            self.doc.materials.push(Material {
                name: name.clone(),
                library: None,
                diffuse_color: [r, g, b],
                diffuse_intensity: 1.0,
                specular_color: [1.0, 1.0, 1.0],
                specular_intensity: 0.5,
                specular_hardness: hardness(pbr.roughness_factor()),
                emit,
            });
            self.material_names.push(name);
        }
    }

    fn import_meshes(&mut self) -> Result<()> {
        let mut names = Names::default();
        for mesh in self.gltf.meshes() {
            let base = mesh
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Mesh{}", mesh.index()));
            let name = names.claim(&base);
            let converted = self
                .convert_mesh(&mesh, name.clone())
                .with_context(|| format!("Failed to convert mesh '{}'", name))?;
            self.doc.meshes.push(converted);
            self.mesh_names.push(name);
        }
        Ok(())
    }

    fn convert_mesh(&self, mesh: &gltf::Mesh, name: String) -> Result<Mesh> {
        let buffers = self.buffers;
        let mut primitives = Vec::new();

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                bail!(
                    "Primitive {} uses {:?}, only triangle lists are supported",
                    primitive.index(),
                    primitive.mode()
                );
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .context("No positions in primitive")?
                .collect();

            let mut uvs: Vec<Vec<[f32; 2]>> = Vec::new();
            while let Some(iter) = reader.read_tex_coords(uvs.len() as u32) {
                uvs.push(iter.into_f32().collect());
            }
            let mut colors: Vec<Vec<[f32; 3]>> = Vec::new();
            while let Some(iter) = reader.read_colors(colors.len() as u32) {
                colors.push(iter.into_rgb_f32().collect());
            }

            let indices: Vec<u32> = match reader.read_indices() {
                Some(iter) => iter.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
                bail!(
                    "Primitive {} index {} out of range ({} vertices)",
                    primitive.index(),
                    bad,
                    positions.len()
                );
            }

            let data = PrimitiveData {
                normals: reader.read_normals().map(|iter| iter.collect()),
                tangents: reader.read_tangents().map(|iter| iter.collect()),
                joints: reader.read_joints(0).map(|iter| iter.into_u16().collect()),
                weights: reader.read_weights(0).map(|iter| iter.into_f32().collect()),
                material: primitive.material().index(),
                positions,
                uvs,
                colors,
                indices,
            };
            data.check_lengths()
                .with_context(|| format!("Primitive {}", primitive.index()))?;
            if data.joints.is_some() != data.weights.is_some() {
                tracing::warn!(
                    "Mesh '{}' primitive {} has partial skinning data (joints or weights missing), ignoring skinning",
                    name,
                    primitive.index()
                );
            }
            primitives.push(data);
        }

        let uv_count = primitives.iter().map(|p| p.uvs.len()).max().unwrap_or(0);
        let color_count = primitives.iter().map(|p| p.colors.len()).max().unwrap_or(0);
        let all =
            |f: fn(&PrimitiveData) -> bool| !primitives.is_empty() && primitives.iter().all(f);
        let options = MeshOptions {
            normals: all(|p| p.normals.is_some()),
            tangents: all(|p| p.tangents.is_some()),
            groups: primitives.iter().any(|p| p.skinning().is_some()),
            material_indices: primitives.len() > 1,
            tangent_uv_source: None,
        };

        let mut positions: Vec<Position> = Vec::new();
        let mut shared: HashMap<PositionKey, u32> = HashMap::new();
        let mut polygons = Vec::new();
        let mut materials = Vec::with_capacity(primitives.len());
        let mut skipped = 0usize;

        for (slot, prim) in primitives.iter().enumerate() {
            materials.push(
                prim.material
                    .map(|i| EntityRef::local(self.material_names[i].clone())),
            );

            // Position ids, re-shared across primitives by exact position and weights
            let ids: Vec<u32> = (0..prim.positions.len())
                .map(|v| {
                    let co = to_z_up(prim.positions[v]);
                    let groups = prim.groups(v);
                    let key = PositionKey::new(co, &groups);
                    *shared.entry(key).or_insert_with(|| {
                        positions.push(Position { co, groups });
                        (positions.len() - 1) as u32
                    })
                })
                .collect();

            for tri in prim.indices.chunks_exact(3) {
                let verts = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                let [a, b, c] = verts.map(|v| ids[v]);
                if a == b || b == c || a == c {
                    skipped += 1;
                    continue;
                }
                let corners = verts
                    .iter()
                    .map(|&v| prim.corner(v, ids[v], uv_count, color_count))
                    .collect();
                polygons.push(Polygon {
                    corners,
                    material_index: slot as u32,
                });
            }
        }

        if skipped > 0 {
            tracing::debug!("Mesh '{}': skipped {} degenerate triangles", name, skipped);
        }

        Ok(Mesh {
            name,
            library: None,
            positions,
            polygons,
            uv_layers: (0..uv_count).map(|i| format!("TEXCOORD_{}", i)).collect(),
            color_layers: (0..color_count).map(|i| format!("COLOR_{}", i)).collect(),
            materials,
            options,
        })
    }

    fn import_skins(&mut self) -> Result<()> {
        let buffers = self.buffers;
        let mut armature_names = Names::default();

        for skin in self.gltf.skins() {
            let joints: Vec<gltf::Node> = skin.joints().collect();
            let count = joints.len();
            let base = skin
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Armature{}", skin.index()));
            let armature = armature_names.claim(&base);
            let object = self.object_names.claim(&base);

            let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
            let ibms: Option<Vec<[[f32; 4]; 4]>> =
                reader.read_inverse_bind_matrices().map(|iter| iter.collect());
            if let Some(ibms) = &ibms {
                if ibms.len() != count {
                    bail!(
                        "Skin '{}' has {} inverse bind matrices for {} joints",
                        base,
                        ibms.len(),
                        count
                    );
                }
            }

            let mut bone_names = Names::default();
            let joint_names: Vec<String> = joints
                .iter()
                .map(|j| {
                    let base = j
                        .name()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Bone{}", j.index()));
                    bone_names.claim(&base)
                })
                .collect();

            let joint_index: HashMap<usize, usize> =
                joints.iter().enumerate().map(|(i, j)| (j.index(), i)).collect();
            let parent_of: Vec<Option<usize>> = joints
                .iter()
                .map(|j| {
                    self.parents
                        .get(&j.index())
                        .and_then(|p| joint_index.get(p))
                        .copied()
                })
                .collect();

            // World-space rest matrices, Z-up
            let bind: Vec<Mat4> = joints
                .iter()
                .enumerate()
                .map(|(i, j)| {
                    let m = match &ibms {
                        Some(ibms) => Mat4::from_cols_array_2d(&ibms[i]).inverse(),
                        None => self.world_matrix(j.index()),
                    };
                    mat_to_z_up(m)
                })
                .collect();

            // Parents before children, siblings in joint order
            let mut order = Vec::with_capacity(count);
            let mut stack: Vec<usize> = (0..count)
                .filter(|&i| parent_of[i].is_none())
                .rev()
                .collect();
            while let Some(i) = stack.pop() {
                order.push(i);
                stack.extend((0..count).filter(|&c| parent_of[c] == Some(i)).rev());
            }

            let bones = order
                .iter()
                .map(|&i| {
                    let head = bind[i].w_axis.truncate();
                    let rot = Mat3::from_mat4(bind[i]);
                    let y_axis = rot.y_axis.normalize_or_zero();
                    let length = (0..count)
                        .find(|&c| parent_of[c] == Some(i))
                        .map(|c| (bind[c].w_axis.truncate() - head).length())
                        .filter(|l| *l > f32::EPSILON)
                        .unwrap_or(DEFAULT_BONE_LENGTH);
                    let matrix = Mat3::from_cols(
                        rot.x_axis.normalize_or_zero(),
                        y_axis,
                        rot.z_axis.normalize_or_zero(),
                    );
                    Bone {
                        name: joint_names[i].clone(),
                        parent: parent_of[i].map(|p| joint_names[p].clone()),
                        head: head.to_array(),
                        tail: (head + y_axis * length).to_array(),
                        matrix: rows3(matrix),
                        inherit_rotation: true,
                        local_location: true,
                    }
                })
                .collect();

            self.doc.armatures.push(Armature {
                name: armature.clone(),
                library: None,
                bones,
            });

            let mut armature_object = empty_object(object.clone());
            armature_object.data = Some(DataRef {
                kind: DataKind::Armature,
                target: EntityRef::local(armature),
            });
            armature_object.pose = Some(Pose {
                bones: order
                    .iter()
                    .map(|&i| PoseBone {
                        name: joint_names[i].clone(),
                        location: [0.0; 3],
                        rotation: Rotation::default(),
                        scale: [1.0; 3],
                    })
                    .collect(),
            });
            self.doc.objects.push(armature_object);

            for (joint, bone) in joints.iter().zip(&joint_names) {
                self.joint_bones
                    .entry(joint.index())
                    .or_insert_with(|| (skin.index(), bone.clone()));
            }
            self.skins.push(SkinInfo {
                object,
                joint_names,
            });
        }
        Ok(())
    }

    fn import_nodes(&mut self) {
        for node in self.gltf.nodes() {
            if self.joint_bones.contains_key(&node.index()) {
                continue;
            }
            let base = node
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Object{}", node.index()));
            let name = self.object_names.claim(&base);
            self.node_objects.insert(node.index(), name);
        }

        for node in self.gltf.nodes() {
            let Some(name) = self.node_objects.get(&node.index()) else {
                continue;
            };
            let mut object = empty_object(name.clone());

            let (t, r, s) = node.transform().decomposed();
            object.location = to_z_up(t);
            object.rotation = Rotation::Quaternion(quat_to_z_up(r));
            object.scale = scale_to_z_up(s);

            if let Some(mesh) = node.mesh() {
                object.data = Some(DataRef {
                    kind: DataKind::Mesh,
                    target: EntityRef::local(self.mesh_names[mesh.index()].clone()),
                });
            } else if let Some(camera) = node.camera() {
                let camera_name = camera
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Camera{}", camera.index()));
                object.data = Some(DataRef {
                    kind: DataKind::Unsupported,
                    target: EntityRef::local(camera_name),
                });
            }

            object.parent = self.parents.get(&node.index()).map(|parent| {
                match self.joint_bones.get(parent) {
                    Some((skin, bone)) => ParentRef {
                        object: EntityRef::local(self.skins[*skin].object.clone()),
                        inverse: identity4(),
                        bone: Some(bone.clone()),
                    },
                    None => ParentRef {
                        object: EntityRef::local(self.node_objects[parent].clone()),
                        inverse: identity4(),
                        bone: None,
                    },
                }
            });

            // Skinned meshes ignore their own transform and follow the armature
            if let Some(skin) = node.skin() {
                let info = &self.skins[skin.index()];
                object.vertex_groups = info.joint_names.clone();
                object.parent = Some(ParentRef {
                    object: EntityRef::local(info.object.clone()),
                    inverse: identity4(),
                    bone: None,
                });
                object.location = [0.0; 3];
                object.rotation = Rotation::default();
                object.scale = [1.0; 3];
            }

            self.doc.objects.push(object);
        }
    }

    fn import_animations(&mut self) -> Result<()> {
        let buffers = self.buffers;
        let mut action_names = Names::default();

        for animation in self.gltf.animations() {
            let animation_name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Animation{}", animation.index()));

            // (owner object, action) in first-seen order
            let mut actions: Vec<(String, Action)> = Vec::new();

            for channel in animation.channels() {
                let node = channel.target().node();
                let (owner, prefix, group) =
                    if let Some((skin, bone)) = self.joint_bones.get(&node.index()) {
                        (
                            self.skins[*skin].object.clone(),
                            format!("pose.bones[\"{}\"].", bone),
                            bone.clone(),
                        )
                    } else if let Some(object) = self.node_objects.get(&node.index()) {
                        (object.clone(), String::new(), OBJECT_GROUP.to_string())
                    } else {
                        continue;
                    };

                let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
                let times: Vec<f32> = reader
                    .read_inputs()
                    .context("Animation channel has no input times")?
                    .collect();
                let outputs = reader
                    .read_outputs()
                    .context("Animation channel has no output values")?;
                let (property, values): (&str, Vec<Vec<f32>>) = match outputs {
                    ReadOutputs::Translations(iter) => {
                        ("location", iter.map(|v| to_z_up(v).to_vec()).collect())
                    }
                    ReadOutputs::Rotations(iter) => (
                        "rotation_quaternion",
                        iter.into_f32().map(|q| quat_to_z_up(q).to_vec()).collect(),
                    ),
                    ReadOutputs::Scales(iter) => {
                        ("scale", iter.map(|s| scale_to_z_up(s).to_vec()).collect())
                    }
                    ReadOutputs::MorphTargetWeights(_) => {
                        tracing::debug!(
                            "Skipping morph target channel in animation '{}'",
                            animation_name
                        );
                        continue;
                    }
                };

                let path = format!("{}{}", prefix, property);
                let fcurves = channel_fcurves(
                    &path,
                    &group,
                    &times,
                    &values,
                    channel.sampler().interpolation(),
                )
                .with_context(|| format!("Animation '{}'", animation_name))?;

                match actions.iter_mut().find(|(o, _)| *o == owner) {
                    Some((_, action)) => action.fcurves.extend(fcurves),
                    None => {
                        let name = action_names.claim(&format!("{}_{}", animation_name, owner));
                        actions.push((
                            owner,
                            Action {
                                name,
                                library: None,
                                fcurves,
                            },
                        ));
                    }
                }
            }

            for (owner, action) in actions {
                if let Some(object) = self.doc.objects.iter_mut().find(|o| o.name == owner) {
                    if object.action.is_none() {
                        object.action = Some(EntityRef::local(action.name.clone()));
                    }
                }
                self.doc.actions.push(action);
            }
        }
        Ok(())
    }

    fn import_scenes(&mut self) {
        let mut names = Names::default();

        for scene in self.gltf.scenes() {
            let base = scene
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Scene{}", scene.index()));
            let mut objects: Vec<String> = Vec::new();
            let mut add = |name: &String| {
                if !objects.contains(name) {
                    objects.push(name.clone());
                }
            };

            let mut stack: Vec<gltf::Node> = scene.nodes().collect();
            stack.reverse();
            while let Some(node) = stack.pop() {
                if let Some((skin, _)) = self.joint_bones.get(&node.index()) {
                    add(&self.skins[*skin].object);
                } else if let Some(object) = self.node_objects.get(&node.index()) {
                    add(object);
                }
                if let Some(skin) = node.skin() {
                    add(&self.skins[skin.index()].object);
                }
                let children: Vec<gltf::Node> = node.children().collect();
                stack.extend(children.into_iter().rev());
            }

            self.doc.scenes.push(Scene {
                name: names.claim(&base),
                library: None,
                background_color: [0.05; 3],
                objects: objects.into_iter().map(EntityRef::local).collect(),
            });
        }

        if self.doc.scenes.is_empty() && !self.doc.objects.is_empty() {
            self.doc.scenes.push(Scene {
                name: "Scene".to_string(),
                library: None,
                background_color: [0.05; 3],
                objects: self
                    .doc
                    .objects
                    .iter()
                    .map(|o| EntityRef::local(o.name.clone()))
                    .collect(),
            });
        }
    }

    /// World matrix of a node in glTF space
    fn world_matrix(&self, node: usize) -> Mat4 {
        let local = self
            .gltf
            .nodes()
            .nth(node)
            .map(|n| Mat4::from_cols_array_2d(&n.transform().matrix()))
            .unwrap_or(Mat4::IDENTITY);
        match self.parents.get(&node) {
            Some(&parent) => self.world_matrix(parent) * local,
            None => local,
        }
    }
}

// ============================================================================
// Primitive data
// ============================================================================

struct PrimitiveData {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    /// xyz direction, w handedness
    tangents: Option<Vec<[f32; 4]>>,
    uvs: Vec<Vec<[f32; 2]>>,
    colors: Vec<Vec<[f32; 3]>>,
    joints: Option<Vec<[u16; 4]>>,
    weights: Option<Vec<[f32; 4]>>,
    indices: Vec<u32>,
    material: Option<usize>,
}

impl PrimitiveData {
    fn check_lengths(&self) -> Result<()> {
        let n = self.positions.len();
        let mut lengths = vec![
            ("NORMAL", self.normals.as_ref().map(Vec::len)),
            ("TANGENT", self.tangents.as_ref().map(Vec::len)),
            ("JOINTS_0", self.joints.as_ref().map(Vec::len)),
            ("WEIGHTS_0", self.weights.as_ref().map(Vec::len)),
        ];
        lengths.extend(self.uvs.iter().map(|l| ("TEXCOORD", Some(l.len()))));
        lengths.extend(self.colors.iter().map(|l| ("COLOR", Some(l.len()))));

        for (attribute, len) in lengths {
            if let Some(len) = len {
                if len != n {
                    bail!("{} has {} values for {} positions", attribute, len, n);
                }
            }
        }
        if self.indices.len() % 3 != 0 {
            bail!("{} indices do not form whole triangles", self.indices.len());
        }
        Ok(())
    }

    /// Joints and weights, only when both are present
    fn skinning(&self) -> Option<(&[[u16; 4]], &[[f32; 4]])> {
        match (&self.joints, &self.weights) {
            (Some(j), Some(w)) => Some((j, w)),
            _ => None,
        }
    }

    /// Non-zero skin influences of vertex `v`
    fn groups(&self, v: usize) -> Vec<GroupWeight> {
        let Some((joints, weights)) = self.skinning() else {
            return Vec::new();
        };
        joints[v]
            .iter()
            .zip(weights[v])
            .filter(|(_, w)| *w > 0.0)
            .map(|(&group, weight)| GroupWeight {
                group: group as i32,
                weight,
            })
            .collect()
    }

    fn corner(&self, v: usize, position: u32, uv_count: usize, color_count: usize) -> Corner {
        Corner {
            position,
            normal: self.normals.as_ref().map_or([0.0; 3], |n| to_z_up(n[v])),
            tangent: self
                .tangents
                .as_ref()
                .map(|t| to_z_up([t[v][0], t[v][1], t[v][2]])),
            // glTF puts the UV origin top-left
            uvs: (0..uv_count)
                .map(|l| self.uvs.get(l).map_or([0.0, 0.0], |uv| [uv[v][0], 1.0 - uv[v][1]]))
                .collect(),
            colors: (0..color_count)
                .map(|l| self.colors.get(l).map_or([1.0; 3], |c| c[v]))
                .collect(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct PositionKey {
    co: [u32; 3],
    groups: Vec<(i32, u32)>,
}

impl PositionKey {
    fn new(co: [f32; 3], groups: &[GroupWeight]) -> Self {
        Self {
            co: co.map(f32::to_bits),
            groups: groups.iter().map(|g| (g.group, g.weight.to_bits())).collect(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn empty_object(name: String) -> Object {
    Object {
        name,
        library: None,
        args: Vec::new(),
        data: None,
        parent: None,
        location: [0.0; 3],
        rotation: Rotation::default(),
        scale: [1.0; 3],
        vertex_groups: Vec::new(),
        pose: None,
        ik_constraints: Vec::new(),
        action: None,
    }
}

/// Blender-style hardness (1-511) from PBR roughness
fn hardness(roughness: f32) -> i32 {
    (1.0 + (1.0 - roughness.clamp(0.0, 1.0)) * 510.0).round() as i32
}

/// One f-curve per component of a sampled channel.
///
/// Cubic-spline samplers store `(in-tangent, value, out-tangent)` per key;
/// the tangents become Bezier handles a third of the way to the neighbours.
fn channel_fcurves(
    path: &str,
    group: &str,
    times: &[f32],
    values: &[Vec<f32>],
    interpolation: GltfInterpolation,
) -> Result<Vec<FCurve>> {
    let cubic = interpolation == GltfInterpolation::CubicSpline;
    let per_key = if cubic { 3 } else { 1 };
    if values.len() != times.len() * per_key {
        bail!(
            "Channel '{}' has {} values for {} keyframes",
            path,
            values.len(),
            times.len()
        );
    }

    let mode = match interpolation {
        GltfInterpolation::Step => Interpolation::Constant,
        GltfInterpolation::Linear => Interpolation::Linear,
        GltfInterpolation::CubicSpline => Interpolation::Bezier,
    };
    let frames: Vec<f32> = times.iter().map(|t| t * FRAME_RATE).collect();
    let components = values.first().map_or(0, Vec::len);

    let fcurves = (0..components)
        .map(|c| {
            let value = |k: usize, part: usize| values[k * per_key + part][c];
            let keyframes = (0..times.len())
                .map(|k| {
                    if !cubic {
                        return Keyframe {
                            co: [frames[k], value(k, 0)],
                            handle_left: None,
                            handle_right: None,
                            interpolation: mode,
                        };
                    }
                    let v = value(k, 1);
                    let handle_left = (k > 0).then(|| {
                        let dt = times[k] - times[k - 1];
                        [
                            frames[k] - (frames[k] - frames[k - 1]) / 3.0,
                            v - value(k, 0) * dt / 3.0,
                        ]
                    });
                    let handle_right = (k + 1 < times.len()).then(|| {
                        let dt = times[k + 1] - times[k];
                        [
                            frames[k] + (frames[k + 1] - frames[k]) / 3.0,
                            v + value(k, 2) * dt / 3.0,
                        ]
                    });
                    Keyframe {
                        co: [frames[k], v],
                        handle_left,
                        handle_right,
                        interpolation: mode,
                    }
                })
                .collect();
            FCurve {
                data_path: path.to_string(),
                array_index: c as i32,
                group: Some(group.to_string()),
                keyframes,
            }
        })
        .collect();
    Ok(fcurves)
}
