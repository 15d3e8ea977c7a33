//! Mesh record export flags
//!
//! The flags word is written as the second field of every mesh record and
//! decides which optional attribute arrays follow:
//!
//! ```text
//! bit 0: normals          (vertex_count × vec3)
//! bit 1: tangents         (vertex_count × vec3)
//! bit 2: skin groups      (width × vertex_count indices, then weights)
//! bit 3: material indices (vertex_count × i32)
//! ```

use crate::error::FormatError;

bitflags::bitflags! {
    /// Per-mesh attribute categories that are exported and take part in welding
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExportFlags: u32 {
        const NORMALS = 0b0000_0001;
        const TANGENTS = 0b0000_0010;
        const GROUPS = 0b0000_0100;
        const MATERIAL_INDICES = 0b0000_1000;
    }
}

impl ExportFlags {
    /// Flags word as written to the file
    #[inline]
    pub fn to_wire(self) -> i32 {
        self.bits() as i32
    }

    /// Parse a flag list such as `"NORMALS|TANGENTS"` or `"normals,groups"`.
    ///
    /// Empty entries are skipped, so `""` parses to no flags. The first
    /// unknown name is an error.
    pub fn parse(s: &str) -> Result<Self, FormatError> {
        let mut flags = ExportFlags::empty();
        for part in s.split(['|', ',', '+']).map(str::trim) {
            flags |= match part.to_ascii_uppercase().as_str() {
                "" => continue,
                "NORMAL" | "NORMALS" => ExportFlags::NORMALS,
                "TANGENT" | "TANGENTS" => ExportFlags::TANGENTS,
                "GROUP" | "GROUPS" | "SKIN" => ExportFlags::GROUPS,
                "MATERIAL" | "MATERIAL_INDICES" | "MAT_INDS" => ExportFlags::MATERIAL_INDICES,
                _ => return Err(FormatError::UnknownFlag(part.to_string())),
            };
        }
        Ok(flags)
    }
}
