use super::{PatchError, PatchRecord, EOF_MARKER, MAGIC};

fn be24(bytes: &[u8]) -> usize {
    (bytes[0] as usize) << 16 | (bytes[1] as usize) << 8 | bytes[2] as usize
}

fn be16(bytes: &[u8]) -> usize {
    (bytes[0] as usize) << 8 | bytes[1] as usize
}

/// Streams the records of a patch one at a time.
///
/// Iteration ends cleanly at the EOF marker. Any problem is yielded once as
/// an `Err` and iteration stops there.
#[derive(Debug, Clone)]
pub struct PatchReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> PatchReader<'a> {
    /// Check the signature. Anything shorter than the signature plus an EOF
    /// marker is rejected as well.
    pub fn new(bytes: &'a [u8]) -> Result<Self, PatchError> {
        if bytes.len() < MAGIC.len() + 3 || !bytes.starts_with(MAGIC) {
            return Err(PatchError::BadSignature);
        }
        Ok(PatchReader {
            bytes,
            pos: MAGIC.len(),
            done: false,
        })
    }

    /// Position of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn fail(&mut self, err: PatchError) -> Option<Result<PatchRecord<'a>, PatchError>> {
        self.done = true;
        Some(Err(err))
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

impl<'a> Iterator for PatchReader<'a> {
    type Item = Result<PatchRecord<'a>, PatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let at = self.pos;
        match self.remaining() {
            0 => return self.fail(PatchError::MissingEof),
            1 | 2 => return self.fail(PatchError::TruncatedOffset { at }),
            _ => {}
        }

        let offset = be24(&self.bytes[at..]);
        self.pos += 3;
        if offset == EOF_MARKER {
            self.done = true;
            return None;
        }

        if self.remaining() < 2 {
            return self.fail(PatchError::TruncatedSize { at });
        }
        let size = be16(&self.bytes[self.pos..]);
        self.pos += 2;

        if size == 0 {
            if self.remaining() < 2 {
                return self.fail(PatchError::TruncatedRleSize { at });
            }
            let len = be16(&self.bytes[self.pos..]);
            self.pos += 2;
            if self.remaining() < 1 {
                return self.fail(PatchError::TruncatedRleByte { at });
            }
            let byte = self.bytes[self.pos];
            self.pos += 1;
            return Some(Ok(PatchRecord::Rle { offset, len, byte }));
        }

        if self.remaining() < size {
            let available = self.remaining();
            return self.fail(PatchError::TruncatedData {
                at,
                needed: size,
                available,
            });
        }
        let data = &self.bytes[self.pos..self.pos + size];
        self.pos += size;
        Some(Ok(PatchRecord::Literal { offset, data }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_records_until_eof() {
        let patch = b"PATCH\x00\x00\x10\x00\x02\xAA\xBB\x00\x00\x20\x00\x00\x00\x03\xCCEOF";
        let records: Vec<_> = PatchReader::new(patch).unwrap().collect();
        assert_eq!(
            records,
            vec![
                Ok(PatchRecord::Literal {
                    offset: 0x10,
                    data: &[0xAA, 0xBB][..]
                }),
                Ok(PatchRecord::Rle {
                    offset: 0x20,
                    len: 3,
                    byte: 0xCC
                }),
            ]
        );
    }

    #[test]
    fn bytes_after_eof_are_not_read() {
        let mut reader = PatchReader::new(b"PATCHEOF\x01\x02\x03").unwrap();
        assert!(reader.next().is_none());
        assert_eq!(reader.position(), 8);
    }

    #[test]
    fn signature_checks() {
        assert_eq!(PatchReader::new(b"PATCH").unwrap_err(), PatchError::BadSignature);
        assert_eq!(PatchReader::new(b"PATCHEO").unwrap_err(), PatchError::BadSignature);
        assert_eq!(PatchReader::new(b"PATCX\0\0\0EOF").unwrap_err(), PatchError::BadSignature);
        assert!(PatchReader::new(b"PATCHEOF").is_ok());
    }

    #[test]
    fn truncations_are_reported_once() {
        let cases: [(&[u8], PatchError); 6] = [
            (&b"PATCH\x00\x00\x10\x00\x02\xAA\xBB"[..], PatchError::MissingEof),
            (&b"PATCH\x00\x00\x10\x00\x01\xAA\x00"[..], PatchError::TruncatedOffset { at: 11 }),
            (&b"PATCH\x00\x00\x10\x00"[..], PatchError::TruncatedSize { at: 5 }),
            (&b"PATCH\x00\x00\x10\x00\x00\x00"[..], PatchError::TruncatedRleSize { at: 5 }),
            (&b"PATCH\x00\x00\x10\x00\x00\x00\x05"[..], PatchError::TruncatedRleByte { at: 5 }),
            (
                &b"PATCH\x00\x00\x10\x00\x04\xDE\xAD"[..],
                PatchError::TruncatedData {
                    at: 5,
                    needed: 4,
                    available: 2,
                },
            ),
        ];
        for (patch, expected) in cases {
            let mut reader = PatchReader::new(patch).unwrap();
            let err = reader.find_map(|r| r.err()).unwrap();
            assert_eq!(err, expected);
            assert!(reader.next().is_none());
        }
    }
}
