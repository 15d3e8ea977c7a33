//! Shared types and writers for DevilModel (.dvm) containers
//!
//! This crate provides the format-level pieces shared by the exporter and by
//! anything that needs to agree with it on the wire layout:
//!
//! # Modules
//!
//! - [`formats`] - Container header, section tags, mesh export flags
//! - [`encode`] - Big-endian scalars, padded text, Z-up → Y-up remapping
//! - [`block`] - Size-prefixed nestable blocks with backpatched lengths

pub mod block;
pub mod encode;
pub mod error;
pub mod formats;

pub use block::{Block, BlockWriter};
pub use encode::{WriteDvmExt, remap_mat3, remap_mat4, remap_rot, remap_vec3, text_padding};
pub use error::FormatError;
pub use formats::{
    ContainerHeader, DVM_EXT, DVM_MAGIC, DVM_VERSION_MAJOR, DVM_VERSION_MINOR, EntityKind,
    ExportFlags, NO_REFERENCE,
};
