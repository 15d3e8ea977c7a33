//! Block writer
//!
//! A block is a 4-byte big-endian payload length followed by the payload.
//! Blocks nest; the writer keeps a stack of open frames, counts every byte
//! written against all of them, and backpatches the length when a block is
//! closed.
//!
//! ```text
//! open()  -> reserve 4 bytes, push (offset, size = 0)
//! write() -> sink.write_all(bytes), every open frame: size += len
//! close() -> pop, seek(offset), write size (u32 BE), seek(end)
//! ```

use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Seek, SeekFrom, Write};

use crate::error::FormatError;

/// Token for an open block. Must be handed back to [`BlockWriter::close`] in
/// strict LIFO order.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an opened block must be closed"]
pub struct Block {
    depth: usize,
}

impl Block {
    /// Nesting depth (0 for an outermost block)
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Stream offset of the reserved size field
    offset: u64,
    /// Payload bytes written since `open()`
    size: u64,
}

/// Stack-based cursor over a seekable byte sink.
pub struct BlockWriter<W: Write + Seek> {
    inner: W,
    pos: u64,
    frames: Vec<Frame>,
}

impl<W: Write + Seek> BlockWriter<W> {
    /// Wrap a sink, starting at its current position
    pub fn new(mut inner: W) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self {
            inner,
            pos,
            frames: Vec::new(),
        })
    }

    /// Current write position in the sink
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Number of currently open blocks
    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Open a block: reserve the size field and start counting.
    pub fn open(&mut self) -> Result<Block, FormatError> {
        let offset = self.pos;
        // The reserved field belongs to the enclosing blocks' payload
        self.write_all(&[0u8; 4])?;
        self.frames.push(Frame { offset, size: 0 });
        Ok(Block {
            depth: self.frames.len() - 1,
        })
    }

    /// Close the innermost block and backpatch its size field.
    pub fn close(&mut self, block: Block) -> Result<(), FormatError> {
        let top = self.frames.len().checked_sub(1);
        if top != Some(block.depth) {
            return Err(FormatError::UnbalancedBlock {
                expected: top,
                got: block.depth,
            });
        }
        let frame = self.frames.pop().ok_or(FormatError::UnbalancedBlock {
            expected: None,
            got: block.depth,
        })?;
        debug_assert_eq!(frame.offset + 4 + frame.size, self.pos);

        let size = u32::try_from(frame.size)
            .map_err(|_| FormatError::BlockTooLarge { size: frame.size })?;

        let end = self.pos;
        self.inner.seek(SeekFrom::Start(frame.offset))?;
        self.inner.write_u32::<BigEndian>(size)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    /// Run `body` inside a block, closing it afterwards.
    pub fn block<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, FormatError>,
    ) -> Result<T, FormatError> {
        let block = self.open()?;
        let value = body(self)?;
        self.close(block)?;
        Ok(value)
    }

    /// Flush and return the sink. Every block must have been closed.
    pub fn finish(mut self) -> Result<W, FormatError> {
        if !self.frames.is_empty() {
            return Err(FormatError::UnclosedBlocks(self.frames.len()));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write + Seek> Write for BlockWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write_all(buf)?;
        let len = buf.len() as u64;
        self.pos += len;
        for frame in &mut self.frames {
            frame.size += len;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::{BlockWriter, FormatError};
    use crate::encode::WriteDvmExt;
    use std::io::Cursor;

    fn writer() -> BlockWriter<Cursor<Vec<u8>>> {
        BlockWriter::new(Cursor::new(Vec::new())).unwrap()
    }

    fn size_at(bytes: &[u8], offset: usize) -> usize {
        u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize
    }

    #[test]
    fn test_empty_block() {
        let mut w = writer();
        let b = w.open().unwrap();
        w.close(b).unwrap();
        let bytes = w.finish().unwrap().into_inner();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_size_excludes_own_field() {
        let mut w = writer();
        let b = w.open().unwrap();
        w.write_int(7).unwrap();
        w.write_text("abc").unwrap();
        w.close(b).unwrap();
        let bytes = w.finish().unwrap().into_inner();
        assert_eq!(size_at(&bytes, 0), 4 + 8);
        assert_eq!(bytes.len(), 4 + 12);
    }

    #[test]
    fn test_nested_sizes_skip_to_siblings() {
        let mut w = writer();
        w.write_int(99).unwrap(); // unblocked prefix

        let outer = w.open().unwrap();
        w.write_int(1).unwrap();
        let inner_a = w.open().unwrap();
        w.write_floats(&[1.0, 2.0, 3.0]).unwrap();
        let deepest = w.open().unwrap();
        w.write_text("deep").unwrap();
        w.close(deepest).unwrap();
        w.close(inner_a).unwrap();
        let inner_b = w.open().unwrap();
        w.write_int(2).unwrap();
        w.close(inner_b).unwrap();
        w.close(outer).unwrap();

        let sibling = w.open().unwrap();
        w.write_int(3).unwrap();
        w.close(sibling).unwrap();

        let bytes = w.finish().unwrap().into_inner();

        // Outer block at 4: skipping it lands on the sibling
        let outer_size = size_at(&bytes, 4);
        let sibling_at = 4 + 4 + outer_size;
        assert_eq!(size_at(&bytes, sibling_at), 4);
        assert_eq!(sibling_at + 4 + 4, bytes.len());

        // Inside outer: int, then inner_a, then inner_b, then end of outer
        let inner_a_at = 8 + 4;
        let inner_a_size = size_at(&bytes, inner_a_at);
        assert_eq!(inner_a_size, 12 + 4 + 8);
        let inner_b_at = inner_a_at + 4 + inner_a_size;
        let inner_b_size = size_at(&bytes, inner_b_at);
        assert_eq!(inner_b_size, 4);
        assert_eq!(inner_b_at + 4 + inner_b_size, 8 + outer_size);

        // Deepest block inside inner_a, after the three floats
        let deepest_at = inner_a_at + 4 + 12;
        assert_eq!(size_at(&bytes, deepest_at), 8);
    }

    #[test]
    fn test_sink_position_is_restored_after_close() {
        let mut w = writer();
        let b = w.open().unwrap();
        w.write_int(1).unwrap();
        w.close(b).unwrap();
        w.write_int(2).unwrap();
        assert_eq!(w.position(), 12);
        let bytes = w.finish().unwrap().into_inner();
        assert_eq!(&bytes[8..12], &2i32.to_be_bytes());
    }

    #[test]
    fn test_out_of_order_close_is_rejected() {
        let mut w = writer();
        let outer = w.open().unwrap();
        let _inner = w.open().unwrap();
        let err = w.close(outer).unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnbalancedBlock {
                expected: Some(1),
                got: 0
            }
        ));
        assert!(err.is_internal());
    }

    #[test]
    fn test_finish_with_open_block_fails() {
        let mut w = writer();
        let _b = w.open().unwrap();
        let err = w.finish().err().unwrap();
        assert!(matches!(err, FormatError::UnclosedBlocks(1)));
    }

    #[test]
    fn test_block_helper_closes() {
        let mut w = writer();
        let n = w
            .block(|w| {
                w.write_int(5)?;
                Ok(42)
            })
            .unwrap();
        assert_eq!(n, 42);
        assert_eq!(w.depth(), 0);
        let bytes = w.finish().unwrap().into_inner();
        assert_eq!(size_at(&bytes, 0), 4);
    }
}
