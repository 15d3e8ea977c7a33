//! Container header and section tags
//!
//! # Layout
//! ```text
//! 0x00: magic [u8; 12] = 0x9F 0x0A "DevilModel"
//! 0x0C: version_major i16
//! 0x0E: version_minor i16
//! 0x10: sections
//! ```

/// File signature. The leading 0x9F/0x0A bytes catch text-mode mangling.
pub const DVM_MAGIC: [u8; 12] = *b"\x9F\x0ADevilModel";

/// Container major version
pub const DVM_VERSION_MAJOR: i16 = 0;

/// Container minor version
pub const DVM_VERSION_MINOR: i16 = 6;

/// File extension for exported containers
pub const DVM_EXT: &str = "dvm";

/// Wire value for "no reference" and for "local entity" in a library-index slot
pub const NO_REFERENCE: i32 = -1;

/// DevilModel container header (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version_major: i16,
    pub version_minor: i16,
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerHeader {
    pub const SIZE: usize = 16;

    /// Header for the current format version
    pub const fn new() -> Self {
        Self {
            version_major: DVM_VERSION_MAJOR,
            version_minor: DVM_VERSION_MINOR,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..12].copy_from_slice(&DVM_MAGIC);
        bytes[12..14].copy_from_slice(&self.version_major.to_be_bytes());
        bytes[14..16].copy_from_slice(&self.version_minor.to_be_bytes());
        bytes
    }

    /// Read header from bytes. Returns `None` on short input or a bad magic.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || bytes[0..12] != DVM_MAGIC {
            return None;
        }
        Some(Self {
            version_major: i16::from_be_bytes([bytes[12], bytes[13]]),
            version_minor: i16::from_be_bytes([bytes[14], bytes[15]]),
        })
    }
}

/// Exportable entity kinds.
///
/// The discriminant is the section tag written before each section, and is
/// reused as the data-type discriminator in object records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum EntityKind {
    Library = 0,
    Action = 1,
    Armature = 2,
    Curve = 3,
    Lamp = 4,
    Material = 5,
    Mesh = 6,
    Object = 7,
    Scene = 8,
}

impl EntityKind {
    /// Section order in the file. Sections only refer to earlier ones.
    pub const ORDER: [EntityKind; 9] = [
        EntityKind::Library,
        EntityKind::Action,
        EntityKind::Armature,
        EntityKind::Curve,
        EntityKind::Lamp,
        EntityKind::Material,
        EntityKind::Mesh,
        EntityKind::Object,
        EntityKind::Scene,
    ];

    /// Section tag as written to the file
    #[inline]
    pub const fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Option<Self> {
        Self::ORDER.get(usize::try_from(tag).ok()?).copied()
    }

    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::Library => "library",
            EntityKind::Action => "action",
            EntityKind::Armature => "armature",
            EntityKind::Curve => "curve",
            EntityKind::Lamp => "lamp",
            EntityKind::Material => "material",
            EntityKind::Mesh => "mesh",
            EntityKind::Object => "object",
            EntityKind::Scene => "scene",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
