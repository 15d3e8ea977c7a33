//! DevilModel binary container format
//!
//! Big-endian throughout. A file is a fixed header followed by one section per
//! entity kind, in [`EntityKind::ORDER`]:
//!
//! ```text
//! magic (12 bytes) | version_major i16 | version_minor i16
//! repeated: section_tag i32 | block { entity_count i32, records... }
//! ```
//!
//! A block is a 4-byte big-endian payload length followed by the payload, so a
//! reader can skip any section it does not understand. Later sections refer to
//! earlier ones by index, so sections must be read in file order.

pub mod container;
pub mod mesh;

pub use container::*;
pub use mesh::*;
