//! Entity index map
//!
//! Each local entity's position within its kind's section, assigned once per
//! export from collection order. Linked entities map to `-1`: they are never
//! written to their own section and are referenced by library and name.
//!
//! Reference encoding:
//!
//! ```text
//! library_index:int32      # -1 => local, followed by index:int32
//!                          # >= 0 => linked, followed by name:text
//! ```

use std::io::Write;

use dvm_common::{EntityKind, WriteDvmExt, NO_REFERENCE};
use hashbrown::HashMap;

use crate::error::ExportError;
use crate::scene::{Document, Entity, EntityRef};

type Key<'a> = (EntityKind, Option<&'a str>, &'a str);

/// Read-only after [`EntityIndexMap::assign`]; borrows the document's names.
#[derive(Debug, Default)]
pub struct EntityIndexMap<'a> {
    indices: HashMap<Key<'a>, i32>,
    local_counts: HashMap<EntityKind, usize>,
}

impl<'a> EntityIndexMap<'a> {
    /// Number every entity of `doc`: locals from 0 in collection order,
    /// linked entities `-1`.
    pub fn assign(doc: &'a Document) -> Self {
        let mut map = Self::default();
        map.insert_all(&doc.libraries);
        map.insert_all(&doc.actions);
        map.insert_all(&doc.armatures);
        map.insert_all(&doc.curves);
        map.insert_all(&doc.lamps);
        map.insert_all(&doc.materials);
        map.insert_all(&doc.meshes);
        map.insert_all(&doc.objects);
        map.insert_all(&doc.scenes);
        map
    }

    fn insert_all<E: Entity>(&mut self, entities: &'a [E]) {
        let mut next = 0usize;
        for entity in entities {
            let index = if entity.is_local() {
                next += 1;
                (next - 1) as i32
            } else {
                NO_REFERENCE
            };
            // First definition wins; duplicates are rejected by validation
            self.indices
                .entry((E::KIND, entity.library(), entity.name()))
                .or_insert(index);
        }
        self.local_counts.insert(E::KIND, next);
    }

    /// Index of an entity, `-1` if linked, `None` if unknown
    pub fn index_of(&self, kind: EntityKind, name: &str, library: Option<&str>) -> Option<i32> {
        self.indices.get(&(kind, library, name)).copied()
    }

    /// Index of a referenced entity; a miss is an internal error
    pub fn resolve(&self, kind: EntityKind, target: &EntityRef) -> Result<i32, ExportError> {
        self.index_of(kind, &target.name, target.library.as_deref())
            .ok_or_else(|| ExportError::IndexMiss {
                kind,
                target: target.clone(),
            })
    }

    /// Index of a library by name
    pub fn library_index(&self, library: &str) -> Result<i32, ExportError> {
        self.index_of(EntityKind::Library, library, None)
            .ok_or_else(|| ExportError::IndexMiss {
                kind: EntityKind::Library,
                target: EntityRef::local(library),
            })
    }

    /// Number of local entities of `kind`
    pub fn local_count(&self, kind: EntityKind) -> usize {
        self.local_counts.get(&kind).copied().unwrap_or(0)
    }

    /// Write a dual-mode reference
    pub fn write_ref<W: Write + ?Sized>(
        &self,
        w: &mut W,
        kind: EntityKind,
        target: &EntityRef,
    ) -> Result<(), ExportError> {
        match &target.library {
            None => {
                w.write_int(NO_REFERENCE)?;
                w.write_int(self.resolve(kind, target)?)?;
            }
            Some(library) => {
                w.write_int(self.library_index(library)?)?;
                w.write_text(&target.name)?;
            }
        }
        Ok(())
    }

    /// Index for an optional local-only reference, `-1` when absent.
    ///
    /// Linked targets never reach here: validation rejects them.
    pub fn local_index(
        &self,
        kind: EntityKind,
        target: Option<&EntityRef>,
    ) -> Result<i32, ExportError> {
        let Some(target) = target else {
            return Ok(NO_REFERENCE);
        };
        match self.resolve(kind, target)? {
            NO_REFERENCE => Err(ExportError::IndexMiss {
                kind,
                target: target.clone(),
            }),
            index => Ok(index),
        }
    }
}
