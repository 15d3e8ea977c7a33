//! In-memory scene description consumed by the exporter
//!
//! This is the host-side view of a scene: collections of named entities, with
//! meshes already tessellated into polygons whose corners carry their own
//! attributes. Conventions:
//!
//! - Z-up, right-handed, Y forward
//! - matrices are row-major, `m[row][col]`
//! - quaternions are `(w, x, y, z)`
//!
//! Entities with `library: Some(..)` are linked from an external library file;
//! they are referenced by name and never serialized into their own section.

mod validate;

pub use validate::validate;

use dvm_common::{EntityKind, ExportFlags};
use glam::{EulerRot, Quat, Vec3};
use serde::Deserialize;

/// Every exportable collection, in section order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Document {
    pub libraries: Vec<Library>,
    pub actions: Vec<Action>,
    pub armatures: Vec<Armature>,
    pub curves: Vec<Curve>,
    pub lamps: Vec<Lamp>,
    pub materials: Vec<Material>,
    pub meshes: Vec<Mesh>,
    pub objects: Vec<Object>,
    pub scenes: Vec<Scene>,
}

/// Common view over the named entities of a [`Document`]
pub trait Entity {
    const KIND: EntityKind;

    fn name(&self) -> &str;

    /// Owning library, `None` for entities that live in this file
    fn library(&self) -> Option<&str>;

    fn is_local(&self) -> bool {
        self.library().is_none()
    }
}

macro_rules! impl_entity {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: EntityKind = EntityKind::$kind;

                fn name(&self) -> &str {
                    &self.name
                }

                fn library(&self) -> Option<&str> {
                    self.library.as_deref()
                }
            }
        )*
    };
}

impl_entity! {
    Action => Action,
    Armature => Armature,
    Curve => Curve,
    Lamp => Lamp,
    Material => Material,
    Mesh => Mesh,
    Object => Object,
    Scene => Scene,
}

impl Entity for Library {
    const KIND: EntityKind = EntityKind::Library;

    fn name(&self) -> &str {
        &self.name
    }

    fn library(&self) -> Option<&str> {
        None
    }
}

/// Reference to an entity by name, optionally inside a linked library
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct EntityRef {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
}

impl EntityRef {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            library: None,
        }
    }

    pub fn linked(name: impl Into<String>, library: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            library: Some(library.into()),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.library {
            Some(lib) => write!(f, "'{}' (library '{}')", self.name, lib),
            None => write!(f, "'{}'", self.name),
        }
    }
}

/// Externally linked library file
#[derive(Debug, Clone, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub filepath: String,
}

// ============================================================================
// Animation
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub fcurves: Vec<FCurve>,
}

/// One animated scalar channel
#[derive(Debug, Clone, Deserialize)]
pub struct FCurve {
    pub data_path: String,
    #[serde(default)]
    pub array_index: i32,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Keyframe {
    /// `(frame, value)`
    pub co: [f32; 2],
    #[serde(default)]
    pub handle_left: Option<[f32; 2]>,
    #[serde(default)]
    pub handle_right: Option<[f32; 2]>,
    #[serde(default)]
    pub interpolation: Interpolation,
}

impl Keyframe {
    pub fn handles(&self) -> ([f32; 2], [f32; 2]) {
        (
            self.handle_left.unwrap_or(self.co),
            self.handle_right.unwrap_or(self.co),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Constant,
    Linear,
    #[default]
    Bezier,
}

impl Interpolation {
    pub fn to_wire(self) -> i32 {
        match self {
            Interpolation::Constant => 0,
            Interpolation::Linear => 1,
            Interpolation::Bezier => 2,
        }
    }
}

// ============================================================================
// Armatures
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Armature {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub bones: Vec<Bone>,
}

/// Rest-pose bone. Parents must be listed before their children.
#[derive(Debug, Clone, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub head: [f32; 3],
    pub tail: [f32; 3],
    #[serde(default = "identity3")]
    pub matrix: [[f32; 3]; 3],
    #[serde(default = "default_true")]
    pub inherit_rotation: bool,
    #[serde(default = "default_true")]
    pub local_location: bool,
}

// ============================================================================
// Curves
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Curve {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub splines: Vec<Spline>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Spline {
    #[serde(default)]
    pub cyclic: bool,
    #[serde(default)]
    pub points: Vec<CurvePoint>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CurvePoint {
    pub co: [f32; 3],
    #[serde(default)]
    pub handle_left: Option<[f32; 3]>,
    #[serde(default)]
    pub handle_right: Option<[f32; 3]>,
    #[serde(default = "default_one")]
    pub radius: f32,
    #[serde(default)]
    pub tilt: f32,
}

// ============================================================================
// Lamps and materials
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Lamp {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default, rename = "type")]
    pub lamp_type: LampType,
    #[serde(default = "white")]
    pub color: [f32; 3],
    #[serde(default = "default_one")]
    pub energy: f32,
    #[serde(default = "default_lamp_distance")]
    pub distance: f32,
    #[serde(default = "default_spot_size")]
    pub spot_size: f32,
    #[serde(default = "default_spot_blend")]
    pub spot_blend: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LampType {
    #[default]
    Point,
    Sun,
    Spot,
    Hemi,
    Area,
}

impl LampType {
    pub fn to_wire(self) -> i32 {
        match self {
            LampType::Point => 0,
            LampType::Sun => 1,
            LampType::Spot => 2,
            LampType::Hemi => 3,
            LampType::Area => 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Material {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default = "default_diffuse_color")]
    pub diffuse_color: [f32; 3],
    #[serde(default = "default_diffuse_intensity")]
    pub diffuse_intensity: f32,
    #[serde(default = "white")]
    pub specular_color: [f32; 3],
    #[serde(default = "default_specular_intensity")]
    pub specular_intensity: f32,
    #[serde(default = "default_specular_hardness")]
    pub specular_hardness: i32,
    #[serde(default)]
    pub emit: f32,
}

// ============================================================================
// Meshes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Mesh {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub uv_layers: Vec<String>,
    #[serde(default)]
    pub color_layers: Vec<String>,
    /// Material slots; `None` is an empty slot
    #[serde(default)]
    pub materials: Vec<Option<EntityRef>>,
    #[serde(default)]
    pub options: MeshOptions,
}

/// Host-side per-mesh export toggles
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    pub normals: bool,
    pub tangents: bool,
    pub groups: bool,
    pub material_indices: bool,
    /// UV layer the tangents were computed from (first layer if unset)
    pub tangent_uv_source: Option<String>,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            normals: true,
            tangents: false,
            groups: false,
            material_indices: false,
            tangent_uv_source: None,
        }
    }
}

impl MeshOptions {
    /// Requested flags, before any per-mesh degradation
    pub fn flags(&self) -> ExportFlags {
        let mut flags = ExportFlags::empty();
        flags.set(ExportFlags::NORMALS, self.normals);
        flags.set(ExportFlags::TANGENTS, self.tangents);
        flags.set(ExportFlags::GROUPS, self.groups);
        flags.set(ExportFlags::MATERIAL_INDICES, self.material_indices);
        flags
    }

    pub fn set_flags(&mut self, flags: ExportFlags) {
        self.normals = flags.contains(ExportFlags::NORMALS);
        self.tangents = flags.contains(ExportFlags::TANGENTS);
        self.groups = flags.contains(ExportFlags::GROUPS);
        self.material_indices = flags.contains(ExportFlags::MATERIAL_INDICES);
    }
}

/// A point shared by any number of corners
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Position {
    pub co: [f32; 3],
    #[serde(default)]
    pub groups: Vec<GroupWeight>,
}

/// Skin-group influence on a position
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GroupWeight {
    pub group: i32,
    pub weight: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Polygon {
    pub corners: Vec<Corner>,
    #[serde(default)]
    pub material_index: u32,
}

/// One polygon's use of a position, with its own attribute values
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Corner {
    pub position: u32,
    #[serde(default)]
    pub normal: [f32; 3],
    #[serde(default)]
    pub tangent: Option<[f32; 3]>,
    /// One entry per mesh UV layer
    #[serde(default)]
    pub uvs: Vec<[f32; 2]>,
    /// One entry per mesh color layer
    #[serde(default)]
    pub colors: Vec<[f32; 3]>,
}

// ============================================================================
// Objects and scenes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Object {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    /// Free-form name/value arguments
    #[serde(default)]
    pub args: Vec<ObjectArg>,
    #[serde(default)]
    pub data: Option<DataRef>,
    #[serde(default)]
    pub parent: Option<ParentRef>,
    #[serde(default)]
    pub location: [f32; 3],
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub vertex_groups: Vec<String>,
    #[serde(default)]
    pub pose: Option<Pose>,
    #[serde(default)]
    pub ik_constraints: Vec<IkConstraint>,
    #[serde(default)]
    pub action: Option<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObjectArg {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Typed object data. Kinds the container cannot express are kept as
/// [`DataKind::Unsupported`] and written as "no data".
#[derive(Debug, Clone, Deserialize)]
pub struct DataRef {
    pub kind: DataKind,
    #[serde(flatten)]
    pub target: EntityRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Armature,
    Curve,
    Lamp,
    Mesh,
    #[serde(other)]
    Unsupported,
}

impl DataKind {
    /// Entity kind the data lives in, `None` for unsupported data
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            DataKind::Armature => Some(EntityKind::Armature),
            DataKind::Curve => Some(EntityKind::Curve),
            DataKind::Lamp => Some(EntityKind::Lamp),
            DataKind::Mesh => Some(EntityKind::Mesh),
            DataKind::Unsupported => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentRef {
    pub object: EntityRef,
    /// Parent-inverse matrix captured when the parent was assigned
    #[serde(default = "identity4")]
    pub inverse: [[f32; 4]; 4],
    /// Parent bone, for objects parented to a bone of an armature object
    #[serde(default)]
    pub bone: Option<String>,
}

/// Object rotation in any of the host's rotation modes.
/// Always exported as a quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Rotation {
    /// `(w, x, y, z)`
    Quaternion([f32; 4]),
    /// `(angle, x, y, z)`
    AxisAngle([f32; 4]),
    /// XYZ euler angles in radians
    Euler([f32; 3]),
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::Quaternion([1.0, 0.0, 0.0, 0.0])
    }
}

impl Rotation {
    /// Rotation as a `(w, x, y, z)` quaternion
    pub fn to_quaternion(&self) -> [f32; 4] {
        let q = match *self {
            Rotation::Quaternion(q) => return q,
            Rotation::AxisAngle([angle, x, y, z]) => match Vec3::new(x, y, z).try_normalize() {
                Some(axis) => Quat::from_axis_angle(axis, angle),
                None => Quat::IDENTITY,
            },
            // X is applied first, then Y, then Z
            Rotation::Euler([x, y, z]) => Quat::from_euler(EulerRot::ZYX, z, y, x),
        };
        [q.w, q.x, q.y, q.z]
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub bones: Vec<PoseBone>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoseBone {
    pub name: String,
    #[serde(default)]
    pub location: [f32; 3],
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct IkConstraint {
    pub bone: String,
    #[serde(default)]
    pub target: Option<EntityRef>,
    #[serde(default)]
    pub target_bone: Option<String>,
    #[serde(default)]
    pub pole_target: Option<EntityRef>,
    #[serde(default)]
    pub pole_bone: Option<String>,
    #[serde(default)]
    pub pole_angle: f32,
    #[serde(default)]
    pub chain_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    pub name: String,
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default = "default_background")]
    pub background_color: [f32; 3],
    #[serde(default)]
    pub objects: Vec<EntityRef>,
}

// ============================================================================
// Defaults
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}

fn white() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_lamp_distance() -> f32 {
    25.0
}

fn default_spot_size() -> f32 {
    std::f32::consts::FRAC_PI_4
}

fn default_spot_blend() -> f32 {
    0.15
}

fn default_diffuse_color() -> [f32; 3] {
    [0.8, 0.8, 0.8]
}

fn default_diffuse_intensity() -> f32 {
    0.8
}

fn default_specular_intensity() -> f32 {
    0.5
}

fn default_specular_hardness() -> i32 {
    50
}

fn default_background() -> [f32; 3] {
    [0.05, 0.05, 0.05]
}

pub(crate) fn identity3() -> [[f32; 3]; 3] {
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
}

pub(crate) fn identity4() -> [[f32; 4]; 4] {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]
}
