//! Record-level helpers for serializer tests

use super::{prepare, ExportOptions, Record};
use crate::scene::Document;

/// Validate `doc` and write a single record of it
pub(crate) fn write_record<E: Record>(doc: &Document, entity: &E, position: usize) -> Vec<u8> {
    let ctx = prepare(doc, &ExportOptions { parallel: false }).unwrap();
    let mut out = Vec::new();
    entity.write_record(&mut out, &ctx, position).unwrap();
    out
}

/// Big-endian cursor over a written record
pub(crate) struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let out: [u8; N] = self.bytes[self.pos..self.pos + N].try_into().unwrap();
        self.pos += N;
        out
    }

    pub fn int(&mut self) -> i32 {
        i32::from_be_bytes(self.take())
    }

    pub fn ints(&mut self, n: usize) -> Vec<i32> {
        (0..n).map(|_| self.int()).collect()
    }

    pub fn float(&mut self) -> f32 {
        f32::from_be_bytes(self.take())
    }

    pub fn floats<const N: usize>(&mut self) -> [f32; N] {
        std::array::from_fn(|_| self.float())
    }

    pub fn text(&mut self) -> String {
        let len = u16::from_be_bytes(self.take()) as usize;
        let s = String::from_utf8(self.bytes[self.pos..self.pos + len].to_vec()).unwrap();
        self.pos += len + dvm_common::text_padding(len);
        s
    }

    /// Everything was read
    pub fn assert_done(&self) {
        assert_eq!(self.pos, self.bytes.len(), "trailing record bytes");
    }
}
