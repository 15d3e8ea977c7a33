//! Export errors
//!
//! Every failure aborts the export and leaves no output file behind. Features
//! that can be dropped without invalidating the rest of a mesh (tangents) are
//! reported as warnings instead; see [`crate::serialize::ExportReport`].

use std::io;

use dvm_common::{EntityKind, FormatError};

use crate::scene::EntityRef;
use crate::weld::WeldError;

/// Broad category of an [`ExportError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The scene contains something the container cannot express
    UnsupportedInput,
    /// A bug in the exporter; never caught and continued
    Internal,
    /// The sink or filesystem failed
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("mesh '{mesh}': {source}")]
    Weld {
        mesh: String,
        #[source]
        source: WeldError,
    },

    #[error("mesh '{mesh}': polygon {polygon} references position {position}, mesh has {count}")]
    PositionOutOfRange {
        mesh: String,
        polygon: usize,
        position: u32,
        count: usize,
    },

    #[error("mesh '{mesh}': polygon {polygon} has {got} {layer} values per corner, mesh has {expected} {layer} layers")]
    LayerMismatch {
        mesh: String,
        polygon: usize,
        layer: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("mesh '{mesh}': polygon {polygon} uses material slot {slot}, mesh has {slots}")]
    MaterialSlotOutOfRange {
        mesh: String,
        polygon: usize,
        slot: u32,
        slots: usize,
    },

    #[error("mesh '{mesh}': material slot {slot} holds linked material {material}")]
    LinkedMaterial {
        mesh: String,
        slot: usize,
        material: EntityRef,
    },

    #[error("{owner}: {field} must be a local entity, got linked {target}")]
    LinkedReference {
        owner: String,
        field: &'static str,
        target: EntityRef,
    },

    #[error("{owner}: {kind} {target} does not exist")]
    DanglingReference {
        owner: String,
        kind: EntityKind,
        target: EntityRef,
    },

    #[error("{owner}: unknown library '{library}'")]
    UnknownLibrary { owner: String, library: String },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("armature '{armature}': bone '{bone}' has parent '{parent}' which is not listed before it")]
    BoneOrder {
        armature: String,
        bone: String,
        parent: String,
    },

    #[error("internal error: {kind} {target} missing from the index map")]
    IndexMiss { kind: EntityKind, target: EntityRef },

    #[error("internal error: {kind} '{name}' written at position {position} but indexed as {index}")]
    IndexMismatch {
        kind: EntityKind,
        name: String,
        position: usize,
        index: i32,
    },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExportError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ExportError::IndexMiss { .. } | ExportError::IndexMismatch { .. } => {
                ErrorClass::Internal
            }
            ExportError::Format(FormatError::Io(_)) | ExportError::Io(_) => ErrorClass::Io,
            ExportError::Format(e) if e.is_internal() => ErrorClass::Internal,
            // Oversized text and counts come from the scene itself
            _ => ErrorClass::UnsupportedInput,
        }
    }
}
