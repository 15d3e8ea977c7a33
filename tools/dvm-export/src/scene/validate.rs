//! Document validation
//!
//! Everything the serializer relies on is checked here, before any byte is
//! written: names are unique per kind, references resolve, local-only fields
//! point at local entities, and mesh corners agree with their mesh.

use dvm_common::{EntityKind, FormatError};
use hashbrown::HashSet;

use super::{Armature, Document, Entity, EntityRef, Mesh};
use crate::error::ExportError;
use crate::index_map::EntityIndexMap;

/// Check `doc` for input the container cannot express.
pub fn validate(doc: &Document) -> Result<(), ExportError> {
    check_names(&doc.libraries)?;
    check_names(&doc.actions)?;
    check_names(&doc.armatures)?;
    check_names(&doc.curves)?;
    check_names(&doc.lamps)?;
    check_names(&doc.materials)?;
    check_names(&doc.meshes)?;
    check_names(&doc.objects)?;
    check_names(&doc.scenes)?;

    let known = EntityIndexMap::assign(doc);
    let refs = RefChecker { known: &known };

    for armature in &doc.armatures {
        check_bones(armature)?;
    }

    for mesh in doc.meshes.iter().filter(|m| m.is_local()) {
        check_mesh(mesh, &refs)?;
    }

    for object in doc.objects.iter().filter(|o| o.is_local()) {
        let owner = format!("object '{}'", object.name);

        if let Some(data) = &object.data {
            if let Some(kind) = data.kind.entity_kind() {
                refs.check(&owner, kind, &data.target)?;
            }
        }
        if let Some(parent) = &object.parent {
            refs.check_local(&owner, "parent", EntityKind::Object, &parent.object)?;
        }
        if let Some(action) = &object.action {
            refs.check_local(&owner, "action", EntityKind::Action, action)?;
        }
        for ik in &object.ik_constraints {
            if let Some(target) = &ik.target {
                refs.check_local(&owner, "IK target", EntityKind::Object, target)?;
            }
            if let Some(pole) = &ik.pole_target {
                refs.check_local(&owner, "IK pole target", EntityKind::Object, pole)?;
            }
        }
    }

    for scene in doc.scenes.iter().filter(|s| s.is_local()) {
        let owner = format!("scene '{}'", scene.name);
        for object in &scene.objects {
            refs.check(&owner, EntityKind::Object, object)?;
        }
    }

    Ok(())
}

/// Unique names per kind and library, known libraries, names that fit a text field
fn check_names<E: Entity>(entities: &[E]) -> Result<(), ExportError> {
    let mut seen = HashSet::new();
    for entity in entities {
        if entity.name().len() > u16::MAX as usize {
            return Err(FormatError::TextTooLong {
                len: entity.name().len(),
            }
            .into());
        }
        if !seen.insert((entity.library(), entity.name())) {
            return Err(ExportError::DuplicateName {
                kind: E::KIND,
                name: entity.name().to_string(),
            });
        }
    }
    Ok(())
}

struct RefChecker<'m, 'a> {
    known: &'m EntityIndexMap<'a>,
}

impl RefChecker<'_, '_> {
    fn check(&self, owner: &str, kind: EntityKind, target: &EntityRef) -> Result<(), ExportError> {
        if let Some(library) = &target.library {
            if self
                .known
                .index_of(EntityKind::Library, library, None)
                .is_none()
            {
                return Err(ExportError::UnknownLibrary {
                    owner: owner.to_string(),
                    library: library.clone(),
                });
            }
        }
        if self
            .known
            .index_of(kind, &target.name, target.library.as_deref())
            .is_none()
        {
            return Err(ExportError::DanglingReference {
                owner: owner.to_string(),
                kind,
                target: target.clone(),
            });
        }
        Ok(())
    }

    fn check_local(
        &self,
        owner: &str,
        field: &'static str,
        kind: EntityKind,
        target: &EntityRef,
    ) -> Result<(), ExportError> {
        if target.library.is_some() {
            return Err(ExportError::LinkedReference {
                owner: owner.to_string(),
                field,
                target: target.clone(),
            });
        }
        self.check(owner, kind, target)
    }
}

fn check_bones(armature: &Armature) -> Result<(), ExportError> {
    for (i, bone) in armature.bones.iter().enumerate() {
        let Some(parent) = &bone.parent else {
            continue;
        };
        if !armature.bones[..i].iter().any(|b| &b.name == parent) {
            return Err(ExportError::BoneOrder {
                armature: armature.name.clone(),
                bone: bone.name.clone(),
                parent: parent.clone(),
            });
        }
    }
    Ok(())
}

fn check_mesh(mesh: &Mesh, refs: &RefChecker<'_, '_>) -> Result<(), ExportError> {
    let owner = format!("mesh '{}'", mesh.name);
    for (slot, material) in mesh.materials.iter().enumerate() {
        let Some(material) = material else {
            continue;
        };
        if material.library.is_some() {
            return Err(ExportError::LinkedMaterial {
                mesh: mesh.name.clone(),
                slot,
                material: material.clone(),
            });
        }
        refs.check(&owner, EntityKind::Material, material)?;
    }

    // A mesh without material slots still draws with slot 0
    let slots = mesh.materials.len().max(1);

    for (index, polygon) in mesh.polygons.iter().enumerate() {
        if polygon.material_index as usize >= slots {
            return Err(ExportError::MaterialSlotOutOfRange {
                mesh: mesh.name.clone(),
                polygon: index,
                slot: polygon.material_index,
                slots: mesh.materials.len(),
            });
        }
        for corner in &polygon.corners {
            if corner.position as usize >= mesh.positions.len() {
                return Err(ExportError::PositionOutOfRange {
                    mesh: mesh.name.clone(),
                    polygon: index,
                    position: corner.position,
                    count: mesh.positions.len(),
                });
            }
            if corner.uvs.len() != mesh.uv_layers.len() {
                return Err(ExportError::LayerMismatch {
                    mesh: mesh.name.clone(),
                    polygon: index,
                    layer: "uv",
                    expected: mesh.uv_layers.len(),
                    got: corner.uvs.len(),
                });
            }
            if corner.colors.len() != mesh.color_layers.len() {
                return Err(ExportError::LayerMismatch {
                    mesh: mesh.name.clone(),
                    polygon: index,
                    layer: "color",
                    expected: mesh.color_layers.len(),
                    got: corner.colors.len(),
                });
            }
        }
    }
    Ok(())
}
