//! Object record
//!
//! ```text
//! name, args, data-type [+ reference], parent [+ inverse, parent-type [+ bone]],
//! location, rotation (quaternion), scale, vertex groups,
//! has_pose [+ pose bones], IK constraints, action
//! ```

use std::io::Write;

use dvm_common::{EntityKind, WriteDvmExt, NO_REFERENCE};
use tracing::debug;

use super::{Context, Record};
use crate::error::ExportError;
use crate::scene::{IkConstraint, Object, Pose};

const PARENT_OBJECT: i32 = 0;
const PARENT_BONE: i32 = 1;

impl Record for Object {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        ctx: &Context<'_>,
        _position: usize,
    ) -> Result<(), ExportError> {
        w.write_text(&self.name)?;

        w.write_len(self.args.len())?;
        for arg in &self.args {
            w.write_text(&arg.name)?;
            w.write_text(&arg.value)?;
        }

        match &self.data {
            Some(data) => match data.kind.entity_kind() {
                Some(kind) => {
                    w.write_int(kind.tag())?;
                    ctx.index.write_ref(w, kind, &data.target)?;
                }
                None => {
                    debug!(
                        object = %self.name,
                        data = %data.target,
                        "unsupported data kind, written as empty"
                    );
                    w.write_int(NO_REFERENCE)?;
                }
            },
            None => w.write_int(NO_REFERENCE)?,
        }

        let parent = self.parent.as_ref();
        let parent_index = ctx
            .index
            .local_index(EntityKind::Object, parent.map(|p| &p.object))?;
        w.write_int(parent_index)?;
        if let Some(parent) = parent {
            w.write_mat4(parent.inverse)?;
            match &parent.bone {
                Some(bone) => {
                    w.write_int(PARENT_BONE)?;
                    w.write_text(bone)?;
                }
                None => w.write_int(PARENT_OBJECT)?,
            }
        }

        w.write_vec3(self.location)?;
        w.write_rot(self.rotation.to_quaternion())?;
        w.write_vec3(self.scale)?;

        w.write_len(self.vertex_groups.len())?;
        for group in &self.vertex_groups {
            w.write_text(group)?;
        }

        write_pose(w, self.pose.as_ref())?;

        w.write_len(self.ik_constraints.len())?;
        for ik in &self.ik_constraints {
            write_ik(w, ctx, ik)?;
        }

        w.write_int(ctx.index.local_index(EntityKind::Action, self.action.as_ref())?)?;
        Ok(())
    }
}

fn write_pose<W: Write>(w: &mut W, pose: Option<&Pose>) -> Result<(), ExportError> {
    let Some(pose) = pose else {
        w.write_bool(false)?;
        return Ok(());
    };
    w.write_bool(true)?;
    w.write_len(pose.bones.len())?;
    for bone in &pose.bones {
        w.write_text(&bone.name)?;
        w.write_vec3(bone.location)?;
        w.write_rot(bone.rotation.to_quaternion())?;
        w.write_vec3(bone.scale)?;
    }
    Ok(())
}

fn write_ik<W: Write>(w: &mut W, ctx: &Context<'_>, ik: &IkConstraint) -> Result<(), ExportError> {
    w.write_text(&ik.bone)?;
    w.write_int(ctx.index.local_index(EntityKind::Object, ik.target.as_ref())?)?;
    w.write_text(ik.target_bone.as_deref().unwrap_or(""))?;
    w.write_int(ctx.index.local_index(EntityKind::Object, ik.pole_target.as_ref())?)?;
    w.write_text(ik.pole_bone.as_deref().unwrap_or(""))?;
    w.write_float(ik.pole_angle)?;
    w.write_len(ik.chain_count as usize)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Document;
    use crate::serialize::testing::{write_record, RecordReader};
    use serde_json::json;

    fn rigged_scene() -> Document {
        serde_json::from_value(json!({
            "actions": [{"name": "Walk"}],
            "armatures": [{"name": "Rig", "bones": [
                {"name": "Root", "head": [0.0, 0.0, 0.0], "tail": [0.0, 0.0, 1.0]},
                {
                    "name": "Child",
                    "parent": "Root",
                    "head": [0.0, 0.0, 1.0],
                    "tail": [0.0, 0.0, 2.0]
                }
            ]}],
            "objects": [
                {
                    "name": "Rig",
                    "data": {"kind": "armature", "name": "Rig"},
                    "pose": {"bones": [{
                        "name": "Root",
                        "location": [1.0, 0.0, 0.0],
                        "rotation": {"mode": "quaternion", "value": [0.0, 1.0, 0.0, 0.0]}
                    }]},
                    "ik_constraints": [{
                        "bone": "Child",
                        "target": {"name": "Target"},
                        "pole_angle": 0.5,
                        "chain_count": 2
                    }],
                    "action": {"name": "Walk"}
                },
                {
                    "name": "Target",
                    "data": {"kind": "camera", "name": "Cam"},
                    "parent": {"object": {"name": "Rig"}}
                },
                {
                    "name": "Sword",
                    "args": [{"name": "hp", "value": "10"}],
                    "parent": {
                        "object": {"name": "Rig"},
                        "bone": "Child",
                        "inverse": [
                            [1.0, 0.0, 0.0, 5.0],
                            [0.0, 1.0, 0.0, 6.0],
                            [0.0, 0.0, 1.0, 7.0],
                            [0.0, 0.0, 0.0, 1.0]
                        ]
                    },
                    "location": [1.0, 2.0, 3.0],
                    "rotation": {"mode": "euler", "value": [0.0, 0.0, 0.0]},
                    "scale": [2.0, 2.0, 2.0],
                    "vertex_groups": ["Blade"]
                }
            ]
        }))
        .unwrap()
    }

    fn assert_identity_transform(r: &mut RecordReader<'_>) {
        assert_eq!(r.floats::<3>(), [0.0, 0.0, 0.0]);
        assert_eq!(r.floats::<4>(), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(r.floats::<3>(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_object_with_pose_ik_and_action() {
        let d = rigged_scene();
        let bytes = write_record(&d, &d.objects[0], 0);
        let mut r = RecordReader::new(&bytes);
        assert_eq!(r.text(), "Rig");
        assert_eq!(r.int(), 0);
        assert_eq!(r.int(), EntityKind::Armature.tag());
        assert_eq!(r.ints(2), vec![-1, 0]);
        assert_eq!(r.int(), -1);
        assert_identity_transform(&mut r);
        assert_eq!(r.int(), 0);

        assert_eq!(r.int(), 1);
        assert_eq!(r.int(), 1);
        assert_eq!(r.text(), "Root");
        assert_eq!(r.floats::<3>(), [0.0, 0.0, 1.0]);
        assert_eq!(r.floats::<4>(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(r.floats::<3>(), [1.0, 1.0, 1.0]);

        assert_eq!(r.int(), 1);
        assert_eq!(r.text(), "Child");
        assert_eq!(r.int(), 1);
        assert_eq!(r.text(), "");
        assert_eq!(r.int(), -1);
        assert_eq!(r.text(), "");
        assert_eq!(r.float(), 0.5);
        assert_eq!(r.int(), 2);

        assert_eq!(r.int(), 0);
        r.assert_done();
    }

    #[test]
    fn test_object_parent_without_data() {
        let d = rigged_scene();
        let bytes = write_record(&d, &d.objects[1], 1);
        let mut r = RecordReader::new(&bytes);
        assert_eq!(r.text(), "Target");
        assert_eq!(r.int(), 0);
        // Camera data has no section
        assert_eq!(r.int(), -1);
        assert_eq!(r.int(), 0);
        for row in 0..4 {
            let mut expected = [0.0; 4];
            expected[row] = 1.0;
            assert_eq!(r.floats::<4>(), expected);
        }
        assert_eq!(r.int(), 0);
        assert_identity_transform(&mut r);
        assert_eq!(r.ints(4), vec![0, 0, 0, -1]);
        r.assert_done();
    }

    #[test]
    fn test_object_parented_to_bone() {
        let d = rigged_scene();
        let bytes = write_record(&d, &d.objects[2], 2);
        let mut r = RecordReader::new(&bytes);
        assert_eq!(r.text(), "Sword");
        assert_eq!(r.int(), 1);
        assert_eq!(r.text(), "hp");
        assert_eq!(r.text(), "10");
        assert_eq!(r.int(), -1);

        assert_eq!(r.int(), 0);
        // Translation column moves with the axis permutation
        assert_eq!(r.floats::<4>(), [1.0, 0.0, 0.0, 6.0]);
        assert_eq!(r.floats::<4>(), [0.0, 1.0, 0.0, 7.0]);
        assert_eq!(r.floats::<4>(), [0.0, 0.0, 1.0, 5.0]);
        assert_eq!(r.floats::<4>(), [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(r.int(), 1);
        assert_eq!(r.text(), "Child");

        assert_eq!(r.floats::<3>(), [2.0, 3.0, 1.0]);
        assert_eq!(r.floats::<4>(), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(r.floats::<3>(), [2.0, 2.0, 2.0]);
        assert_eq!(r.int(), 1);
        assert_eq!(r.text(), "Blade");
        assert_eq!(r.ints(3), vec![0, 0, -1]);
        r.assert_done();
    }
}
