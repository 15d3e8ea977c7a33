//! Primitive encoder
//!
//! Fixed-width big-endian scalars, padded text, and the coordinate remap from
//! the source convention (Z-up, right-handed, Y forward) to the container's
//! Y-up convention:
//!
//! - vector `(x, y, z)` → `(y, z, x)`
//! - quaternion / axis-angle `(w, x, y, z)` → `(w, y, z, x)`
//! - matrix `m'[i][j] = m[p(i)][p(j)]` with `p = (1, 2, 0[, 3])`
//!
//! This is the only place the conversion happens; every spatial field goes
//! through exactly one of the `write_vec3`/`write_rot`/`write_mat*` methods.
//! Colors, UVs and scalar animation values are written as-is.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

use crate::error::FormatError;

/// Axis permutation shared by the vector and matrix remaps
const AXIS_PERMUTATION: [usize; 4] = [1, 2, 0, 3];

/// Remap a vector from Z-up to Y-up
#[inline]
pub const fn remap_vec3(v: [f32; 3]) -> [f32; 3] {
    [v[1], v[2], v[0]]
}

/// Remap a quaternion or axis-angle `(w, x, y, z)` from Z-up to Y-up
#[inline]
pub const fn remap_rot(r: [f32; 4]) -> [f32; 4] {
    [r[0], r[2], r[3], r[1]]
}

/// Remap a row-major 3×3 matrix (rows and columns permuted like vectors)
pub fn remap_mat3(m: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = m[AXIS_PERMUTATION[i]][AXIS_PERMUTATION[j]];
        }
    }
    out
}

/// Remap a row-major 4×4 affine matrix; the homogeneous row/column stay put
pub fn remap_mat4(m: [[f32; 4]; 4]) -> [[f32; 4]; 4] {
    let mut out = [[0.0; 4]; 4];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = m[AXIS_PERMUTATION[i]][AXIS_PERMUTATION[j]];
        }
    }
    out
}

/// Zero bytes needed after a text of `byte_len` bytes so that the 2-byte length
/// field plus the text is a multiple of 4.
#[inline]
pub const fn text_padding(byte_len: usize) -> usize {
    (4 - (2 + byte_len) % 4) % 4
}

/// DevilModel primitive writes for any byte sink.
///
/// Implemented for every [`Write`]; the block writer picks these up through its
/// own `Write` impl so each primitive is counted against the open blocks.
pub trait WriteDvmExt: Write {
    fn write_int(&mut self, v: i32) -> Result<(), FormatError> {
        self.write_i32::<BigEndian>(v)?;
        Ok(())
    }

    fn write_short(&mut self, v: i16) -> Result<(), FormatError> {
        self.write_i16::<BigEndian>(v)?;
        Ok(())
    }

    fn write_float(&mut self, v: f32) -> Result<(), FormatError> {
        self.write_f32::<BigEndian>(v)?;
        Ok(())
    }

    fn write_floats(&mut self, values: &[f32]) -> Result<(), FormatError> {
        for &v in values {
            self.write_f32::<BigEndian>(v)?;
        }
        Ok(())
    }

    /// Write a count or index field
    fn write_len(&mut self, len: usize) -> Result<(), FormatError> {
        let v = i32::try_from(len).map_err(|_| FormatError::CountOverflow(len))?;
        self.write_int(v)
    }

    fn write_bool(&mut self, v: bool) -> Result<(), FormatError> {
        self.write_int(v as i32)
    }

    /// Length-prefixed UTF-8, zero-padded to a 4-byte boundary
    fn write_text(&mut self, s: &str) -> Result<(), FormatError> {
        let bytes = s.as_bytes();
        let len = u16::try_from(bytes.len())
            .map_err(|_| FormatError::TextTooLong { len: bytes.len() })?;
        self.write_u16::<BigEndian>(len)?;
        self.write_all(bytes)?;
        self.write_all(&[0u8; 3][..text_padding(bytes.len())])?;
        Ok(())
    }

    /// Spatial vector, remapped to Y-up
    fn write_vec3(&mut self, v: [f32; 3]) -> Result<(), FormatError> {
        self.write_floats(&remap_vec3(v))
    }

    /// Quaternion or axis-angle `(w, x, y, z)`, remapped to Y-up
    fn write_rot(&mut self, r: [f32; 4]) -> Result<(), FormatError> {
        self.write_floats(&remap_rot(r))
    }

    /// Row-major 3×3 rotation, remapped to Y-up
    fn write_mat3(&mut self, m: [[f32; 3]; 3]) -> Result<(), FormatError> {
        for row in remap_mat3(m) {
            self.write_floats(&row)?;
        }
        Ok(())
    }

    /// Row-major 4×4 transform, remapped to Y-up
    fn write_mat4(&mut self, m: [[f32; 4]; 4]) -> Result<(), FormatError> {
        for row in remap_mat4(m) {
            self.write_floats(&row)?;
        }
        Ok(())
    }
}

impl<W: Write + ?Sized> WriteDvmExt for W {}

#[cfg(test)]
mod tests {
    use super::{
        FormatError, WriteDvmExt, remap_mat3, remap_mat4, remap_rot, remap_vec3, text_padding,
    };

    #[test]
    fn test_scalars_are_big_endian() {
        let mut buf = Vec::new();
        buf.write_int(-2).unwrap();
        buf.write_short(0x0102).unwrap();
        buf.write_float(1.0).unwrap();
        assert_eq!(
            buf,
            vec![0xFF, 0xFF, 0xFF, 0xFE, 0x01, 0x02, 0x3F, 0x80, 0x00, 0x00]
        );
    }

    #[test]
    fn test_text_padding_formula() {
        assert_eq!(text_padding(0), 2);
        assert_eq!(text_padding(1), 1);
        assert_eq!(text_padding(2), 0);
        assert_eq!(text_padding(3), 3);
        assert_eq!(text_padding(6), 0);
    }

    #[test]
    fn test_text_lengths_pad_to_four() {
        // One string per residue of the byte length mod 4
        for s in ["", "a", "ab", "abc", "abcd", "é"] {
            let mut buf = Vec::new();
            buf.write_text(s).unwrap();
            let len = s.len();
            assert_eq!(buf.len(), 2 + len + text_padding(len), "text {:?}", s);
            assert_eq!(buf.len() % 4, 0, "text {:?}", s);
            assert_eq!(u16::from_be_bytes([buf[0], buf[1]]) as usize, len);
            assert_eq!(&buf[2..2 + len], s.as_bytes());
            assert!(buf[2 + len..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_text_length_counts_utf8_bytes() {
        let mut buf = Vec::new();
        buf.write_text("ñandú").unwrap();
        assert_eq!(u16::from_be_bytes([buf[0], buf[1]]), 7);
    }

    #[test]
    fn test_text_too_long() {
        let long = "x".repeat(u16::MAX as usize + 1);
        let mut buf = Vec::new();
        let err = buf.write_text(&long).unwrap_err();
        assert!(matches!(err, FormatError::TextTooLong { len } if len == 65536));
    }

    #[test]
    fn test_remap_vector() {
        assert_eq!(remap_vec3([1.0, 2.0, 3.0]), [2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_remap_identity_quaternion() {
        assert_eq!(remap_rot([1.0, 0.0, 0.0, 0.0]), [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(remap_rot([0.5, 1.0, 2.0, 3.0]), [0.5, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn test_remap_mat3_matches_vector_remap() {
        // Rotation of 90° about Z in the source frame
        let m = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let v = [1.0, 0.0, 0.0];
        let mv = mul3(m, v);

        // Remapping M·v must equal remap(M)·remap(v)
        assert_eq!(remap_vec3(mv), mul3(remap_mat3(m), remap_vec3(v)));
    }

    #[test]
    fn test_remap_mat4_keeps_translation_column() {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        m[0][3] = 5.0;
        m[1][3] = 6.0;
        m[2][3] = 7.0;

        let r = remap_mat4(m);
        assert_eq!([r[0][3], r[1][3], r[2][3]], remap_vec3([5.0, 6.0, 7.0]));
        assert_eq!(r[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_write_vec3_goes_through_remap() {
        let mut buf = Vec::new();
        buf.write_vec3([1.0, 2.0, 3.0]).unwrap();
        let floats: Vec<f32> = buf
            .chunks(4)
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(floats, vec![2.0, 3.0, 1.0]);
    }

    fn mul3(m: [[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0; 3];
        for (i, o) in out.iter_mut().enumerate() {
            *o = m[i][0] * v[0] + m[i][1] * v[1] + m[i][2] * v[2];
        }
        out
    }
}
