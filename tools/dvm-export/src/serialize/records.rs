//! Records for libraries, actions, armatures, curves, lamps, materials and scenes

use std::io::Write;

use dvm_common::{EntityKind, WriteDvmExt, NO_REFERENCE};

use super::{Context, Record};
use crate::error::ExportError;
use crate::scene::{Action, Armature, Curve, Lamp, Library, Material, Scene};

impl Record for Library {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        _ctx: &Context<'_>,
        _position: usize,
    ) -> Result<(), ExportError> {
        w.write_text(&self.name)?;
        w.write_text(&self.filepath)?;
        Ok(())
    }
}

impl Record for Action {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        _ctx: &Context<'_>,
        _position: usize,
    ) -> Result<(), ExportError> {
        w.write_text(&self.name)?;
        w.write_len(self.fcurves.len())?;
        for fcurve in &self.fcurves {
            w.write_text(&fcurve.data_path)?;
            w.write_int(fcurve.array_index)?;
            w.write_text(fcurve.group.as_deref().unwrap_or(""))?;
            w.write_len(fcurve.keyframes.len())?;
            for key in &fcurve.keyframes {
                let (left, right) = key.handles();
                w.write_int(key.interpolation.to_wire())?;
                w.write_floats(&key.co)?;
                w.write_floats(&left)?;
                w.write_floats(&right)?;
            }
        }
        Ok(())
    }
}

impl Record for Armature {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        _ctx: &Context<'_>,
        _position: usize,
    ) -> Result<(), ExportError> {
        w.write_text(&self.name)?;
        w.write_len(self.bones.len())?;
        for (i, bone) in self.bones.iter().enumerate() {
            // Parents precede children, so only earlier bones are searched
            let parent = bone
                .parent
                .as_ref()
                .and_then(|p| self.bones[..i].iter().position(|b| &b.name == p));

            w.write_text(&bone.name)?;
            match parent {
                Some(index) => w.write_len(index)?,
                None => w.write_int(NO_REFERENCE)?,
            }
            w.write_vec3(bone.head)?;
            w.write_vec3(bone.tail)?;
            w.write_mat3(bone.matrix)?;
            w.write_bool(bone.inherit_rotation)?;
            w.write_bool(bone.local_location)?;
        }
        Ok(())
    }
}

impl Record for Curve {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        _ctx: &Context<'_>,
        _position: usize,
    ) -> Result<(), ExportError> {
        w.write_text(&self.name)?;
        w.write_len(self.splines.len())?;
        for spline in &self.splines {
            w.write_bool(spline.cyclic)?;
            w.write_len(spline.points.len())?;
            for point in &spline.points {
                w.write_vec3(point.co)?;
                w.write_vec3(point.handle_left.unwrap_or(point.co))?;
                w.write_vec3(point.handle_right.unwrap_or(point.co))?;
                w.write_float(point.radius)?;
                w.write_float(point.tilt)?;
            }
        }
        Ok(())
    }
}

impl Record for Lamp {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        _ctx: &Context<'_>,
        _position: usize,
    ) -> Result<(), ExportError> {
        w.write_text(&self.name)?;
        w.write_int(self.lamp_type.to_wire())?;
        w.write_floats(&self.color)?;
        w.write_float(self.energy)?;
        w.write_float(self.distance)?;
        w.write_float(self.spot_size)?;
        w.write_float(self.spot_blend)?;
        Ok(())
    }
}

impl Record for Material {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        _ctx: &Context<'_>,
        _position: usize,
    ) -> Result<(), ExportError> {
        w.write_text(&self.name)?;
        w.write_floats(&self.diffuse_color)?;
        w.write_float(self.diffuse_intensity)?;
        w.write_floats(&self.specular_color)?;
        w.write_float(self.specular_intensity)?;
        w.write_int(self.specular_hardness)?;
        w.write_float(self.emit)?;
        Ok(())
    }
}

impl Record for Scene {
    fn write_record<W: Write>(
        &self,
        w: &mut W,
        ctx: &Context<'_>,
        _position: usize,
    ) -> Result<(), ExportError> {
        w.write_text(&self.name)?;
        w.write_floats(&self.background_color)?;
        w.write_len(self.objects.len())?;
        for object in &self.objects {
            ctx.index.write_ref(w, EntityKind::Object, object)?;
        }
        Ok(())
    }
}
