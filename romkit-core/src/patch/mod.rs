//! IPS patches: reading, applying and producing them.
//!
//! Layout: the five bytes `PATCH`, then records of a 3-byte big-endian
//! offset and a 2-byte big-endian size. A non-zero size is followed by that
//! many literal bytes; a zero size by a 2-byte run length and the fill byte.
//! The offset value `0x454F46` ("EOF") ends the stream.

use thiserror::Error;

mod apply;
mod reader;
mod writer;

pub use apply::{apply_code_tweak, apply_patch, PatchSummary};
pub use reader::PatchReader;
pub use writer::PatchBuilder;

pub const MAGIC: &[u8; 5] = b"PATCH";

/// Offset value that marks the end of the record list.
pub const EOF_MARKER: usize = 0x45_4F46;

/// Largest offset a 3-byte field can hold.
pub const MAX_OFFSET: usize = 0xFF_FFFF;

/// Largest literal or run length a 2-byte field can hold.
pub const MAX_RECORD_LEN: usize = 0xFFFF;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("not an IPS patch (bad signature)")]
    BadSignature,

    #[error("record at {at:#X} cut off inside its offset")]
    TruncatedOffset { at: usize },

    #[error("record at {at:#X} cut off before its size")]
    TruncatedSize { at: usize },

    #[error("RLE record at {at:#X} cut off before its run length")]
    TruncatedRleSize { at: usize },

    #[error("RLE record at {at:#X} cut off before its fill byte")]
    TruncatedRleByte { at: usize },

    #[error("record at {at:#X} needs {needed} data bytes, only {available} left")]
    TruncatedData {
        at: usize,
        needed: usize,
        available: usize,
    },

    #[error("record writes {len} bytes at {offset:#X}, past the end of a {image_len}-byte image")]
    WritePastEnd {
        offset: usize,
        len: usize,
        image_len: usize,
    },

    #[error("patch ends without an EOF marker")]
    MissingEof,

    #[error("offset {offset:#X} cannot be stored in a record")]
    OffsetOutOfRange { offset: usize },

    #[error("record of {len} bytes is longer than a record can hold")]
    RecordTooLong { len: usize },

    #[error("images differ in length ({original} vs {modified} bytes)")]
    LengthMismatch { original: usize, modified: usize },
}

/// One decoded record. Literal data borrows from the patch bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchRecord<'a> {
    Literal { offset: usize, data: &'a [u8] },
    Rle { offset: usize, len: usize, byte: u8 },
}

impl PatchRecord<'_> {
    pub fn offset(&self) -> usize {
        match *self {
            PatchRecord::Literal { offset, .. } | PatchRecord::Rle { offset, .. } => offset,
        }
    }

    /// Number of image bytes the record writes.
    pub fn len(&self) -> usize {
        match *self {
            PatchRecord::Literal { data, .. } => data.len(),
            PatchRecord::Rle { len, .. } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
