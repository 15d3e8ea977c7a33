//! dvm-export library
//!
//! Loads scene descriptions (JSON documents or glTF 2.0), welds their corner
//! meshes into indexed triangle lists and writes DevilModel (.dvm) containers.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let doc = dvm_export::import::load_document(Path::new("level.glb"))?;
//! let report = dvm_export::export(&doc, Path::new("level.dvm"))?;
//! println!("{} triangles", report.triangles);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod build;
pub mod error;
pub mod import;
pub mod index_map;
pub mod manifest;
pub mod scene;
pub mod serialize;
pub mod weld;

pub use error::{ErrorClass, ExportError};
pub use index_map::EntityIndexMap;
pub use scene::Document;
pub use serialize::{
    check, export, export_with, write_document, ExportOptions, ExportReport, ExportWarning,
};
pub use weld::{weld, WeldError, WeldedMesh};
