//! Minimal .dvm reader for verifying exporter output

#![allow(dead_code)]

use dvm_common::{ContainerHeader, EntityKind};

/// One section of a container
pub struct Section {
    pub kind: EntityKind,
    pub count: usize,
    /// Byte offset of the first record
    pub records: usize,
    /// Byte offset just past the section
    pub end: usize,
}

/// Walk every section of a container using only the block size fields.
pub fn sections(bytes: &[u8]) -> Vec<Section> {
    let header = ContainerHeader::from_bytes(bytes).expect("Invalid container header");
    assert_eq!(header, ContainerHeader::new(), "Unexpected container version");

    let mut out = Vec::new();
    let mut at = ContainerHeader::SIZE;
    while at < bytes.len() {
        let mut r = Reader::at(bytes, at);
        let kind = EntityKind::from_tag(r.int()).expect("Unknown section tag");
        let size = r.int() as usize;
        let body = r.pos;
        let count = r.int() as usize;
        out.push(Section {
            kind,
            count,
            records: r.pos,
            end: body + size,
        });
        at = body + size;
    }
    assert_eq!(at, bytes.len(), "Sections overrun the file");
    out
}

pub fn section(bytes: &[u8], kind: EntityKind) -> Section {
    sections(bytes)
        .into_iter()
        .find(|s| s.kind == kind)
        .expect("Missing section")
}

/// Big-endian cursor over container bytes
pub struct Reader<'a> {
    bytes: &'a [u8],
    pub pos: usize,
}

impl<'a> Reader<'a> {
    pub fn at(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let out: [u8; N] = self.bytes[self.pos..self.pos + N].try_into().unwrap();
        self.pos += N;
        out
    }

    pub fn int(&mut self) -> i32 {
        i32::from_be_bytes(self.take())
    }

    pub fn float(&mut self) -> f32 {
        f32::from_be_bytes(self.take())
    }

    pub fn floats<const N: usize>(&mut self) -> [f32; N] {
        std::array::from_fn(|_| self.float())
    }

    pub fn text(&mut self) -> String {
        let len = u16::from_be_bytes(self.take()) as usize;
        let s = std::str::from_utf8(&self.bytes[self.pos..self.pos + len])
            .unwrap()
            .to_string();
        self.pos += len + dvm_common::text_padding(len);
        s
    }

    /// Dual-encoded reference: `(-1, local index)` or `(library index, name)`
    pub fn reference(&mut self) -> Reference {
        let library = self.int();
        if library < 0 {
            Reference::Local(self.int())
        } else {
            Reference::Linked(library, self.text())
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Reference {
    Local(i32),
    Linked(i32, String),
}
