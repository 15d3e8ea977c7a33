//! Format-level errors raised while encoding a container.

use std::io;

/// Errors produced by the encoder and the block writer.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Text does not fit the 2-byte length prefix
    #[error("text is {len} bytes long, maximum is {max}", max = u16::MAX)]
    TextTooLong { len: usize },

    /// A count or index does not fit an `i32` field
    #[error("count {0} does not fit a 32-bit field")]
    CountOverflow(usize),

    /// A block payload does not fit the 4-byte size field
    #[error("block payload of {size} bytes exceeds the 4-byte size field")]
    BlockTooLarge { size: u64 },

    /// `close()` was called on a block that is not the innermost open one
    #[error("block closed out of order: expected depth {expected:?}, got depth {got}")]
    UnbalancedBlock { expected: Option<usize>, got: usize },

    /// The writer was finished while blocks were still open
    #[error("{0} block(s) still open when the writer was finished")]
    UnclosedBlocks(usize),

    /// A mesh flag list names a flag that does not exist
    #[error("unknown mesh flag '{0}' (expected NORMALS, TANGENTS, GROUPS or MATERIAL_INDICES)")]
    UnknownFlag(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FormatError {
    /// True for errors that indicate a bug in the caller rather than bad input
    /// or a failing sink.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            FormatError::UnbalancedBlock { .. } | FormatError::UnclosedBlocks(_)
        )
    }
}
