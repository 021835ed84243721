use log::debug;

use super::{PatchError, EOF_MARKER, MAGIC, MAX_OFFSET, MAX_RECORD_LEN};

/// Runs of identical bytes at least this long become RLE records in a diff.
pub const RLE_MIN_RUN: usize = 16;

/// Unchanged gaps shorter than this are folded into the surrounding literal,
/// since a new record header costs five bytes.
const MERGE_GAP: usize = 6;

/// Writes IPS patches.
#[derive(Debug, Clone)]
pub struct PatchBuilder {
    out: Vec<u8>,
    records: usize,
}

impl Default for PatchBuilder {
    fn default() -> Self {
        PatchBuilder::new()
    }
}

impl PatchBuilder {
    pub fn new() -> Self {
        PatchBuilder {
            out: MAGIC.to_vec(),
            records: 0,
        }
    }

    pub fn record_count(&self) -> usize {
        self.records
    }

    fn push_header(&mut self, offset: usize, size: usize) -> Result<(), PatchError> {
        if offset > MAX_OFFSET || offset == EOF_MARKER {
            return Err(PatchError::OffsetOutOfRange { offset });
        }
        if size > MAX_RECORD_LEN {
            return Err(PatchError::RecordTooLong { len: size });
        }
        self.out.extend_from_slice(&(offset as u32).to_be_bytes()[1..]);
        self.out.extend_from_slice(&(size as u16).to_be_bytes());
        self.records += 1;
        Ok(())
    }

    /// Add a literal record. Empty data adds nothing.
    pub fn literal(&mut self, offset: usize, data: &[u8]) -> Result<&mut Self, PatchError> {
        if data.is_empty() {
            return Ok(self);
        }
        self.push_header(offset, data.len())?;
        self.out.extend_from_slice(data);
        Ok(self)
    }

    /// Add a record writing `byte` `len` times. A zero length adds nothing.
    pub fn rle(&mut self, offset: usize, len: usize, byte: u8) -> Result<&mut Self, PatchError> {
        if len == 0 {
            return Ok(self);
        }
        if len > MAX_RECORD_LEN {
            return Err(PatchError::RecordTooLong { len });
        }
        self.push_header(offset, 0)?;
        self.out.extend_from_slice(&(len as u16).to_be_bytes());
        self.out.push(byte);
        Ok(self)
    }

    /// Append the EOF marker and return the patch bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.out.extend_from_slice(b"EOF");
        self.out
    }

    /// Build a patch that turns `original` into `modified`.
    pub fn diff(original: &[u8], modified: &[u8]) -> Result<Vec<u8>, PatchError> {
        if original.len() != modified.len() {
            return Err(PatchError::LengthMismatch {
                original: original.len(),
                modified: modified.len(),
            });
        }

        let mut builder = PatchBuilder::new();
        let mut pos = 0;
        while pos < modified.len() {
            if original[pos] == modified[pos] {
                pos += 1;
                continue;
            }

            let start = pos;
            let mut end = pos + 1;
            let mut gap = 0;
            let mut cursor = end;
            while cursor < modified.len() && gap < MERGE_GAP {
                if original[cursor] == modified[cursor] {
                    gap += 1;
                } else {
                    gap = 0;
                    end = cursor + 1;
                }
                cursor += 1;
            }

            builder.push_changed(modified, start, end)?;
            pos = end;
        }

        debug!("diff produced {} record(s)", builder.records);
        Ok(builder.finish())
    }

    /// Emit records for `modified[start..end]`, using RLE for long runs.
    fn push_changed(&mut self, modified: &[u8], start: usize, end: usize) -> Result<(), PatchError> {
        let mut literal_start = start;
        let mut pos = start;
        while pos < end {
            let byte = modified[pos];
            let run = modified[pos..end].iter().take_while(|&&b| b == byte).count();
            if run >= RLE_MIN_RUN {
                self.push_literal_span(modified, literal_start, pos)?;
                self.push_rle_span(modified, pos, pos + run)?;
                literal_start = pos + run;
            }
            pos += run;
        }
        self.push_literal_span(modified, literal_start, end)
    }

    /// Literal records covering `start..end`. A record may not start at the
    /// EOF marker's value, so such a record starts one byte earlier.
    fn push_literal_span(&mut self, modified: &[u8], start: usize, end: usize) -> Result<(), PatchError> {
        let mut pos = start;
        while pos < end {
            let from = if pos == EOF_MARKER { pos - 1 } else { pos };
            let len = (end - from).min(MAX_RECORD_LEN);
            self.literal(from, &modified[from..from + len])?;
            pos = from + len;
        }
        Ok(())
    }

    fn push_rle_span(&mut self, modified: &[u8], start: usize, end: usize) -> Result<(), PatchError> {
        let mut pos = start;
        while pos < end {
            if pos == EOF_MARKER {
                self.push_literal_span(modified, pos, pos + 1)?;
                pos += 1;
                continue;
            }
            let len = (end - pos).min(MAX_RECORD_LEN);
            self.rle(pos, len, modified[pos])?;
            pos += len;
        }
        Ok(())
    }
}
