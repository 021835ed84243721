use std::fmt::Write as _;

use log::{debug, trace};

use super::table::CharacterTable;
use crate::image::check_span;
use crate::{Result, RomError};

/// How the unused tail of a fixed-length field is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Every remaining byte gets this value.
    Repeat(u8),
    /// One terminator (if there is room), then `fill` up to the end.
    TerminateThenFill { terminator: u8, fill: u8 },
}

/// What a fixed-length destination holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Names and other strings shown directly.
    Display,
    /// Strings embedded in map scripts.
    Script,
}

/// What to do with a character that no token matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmatchedPolicy {
    /// Skip it and keep encoding. Matches what existing output was built with.
    #[default]
    Drop,
    /// Fail with [`RomError::Unencodable`].
    Reject,
}

/// Platform text rules layered on top of a character table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextConventions {
    pub terminator: u8,
    pub alt_terminator: Option<u8>,
    pub display_padding: Padding,
    pub script_padding: Padding,
    /// Byte that introduces a one-byte argument, written as `\vNN`.
    pub variable_prefix: Option<u8>,
    /// Longest candidate the encoder tries; `None` means the table's longest token.
    pub window: Option<usize>,
}

impl TextConventions {
    pub const fn game_boy() -> Self {
        TextConventions {
            terminator: 0x50,
            alt_terminator: Some(0x00),
            display_padding: Padding::Repeat(0x50),
            script_padding: Padding::Repeat(0x00),
            variable_prefix: None,
            window: None,
        }
    }

    pub const fn game_boy_advance() -> Self {
        TextConventions {
            terminator: 0xFF,
            alt_terminator: None,
            display_padding: Padding::TerminateThenFill {
                terminator: 0xFF,
                fill: 0x00,
            },
            script_padding: Padding::TerminateThenFill {
                terminator: 0xFF,
                fill: 0x00,
            },
            variable_prefix: Some(0xFD),
            window: Some(4),
        }
    }

    pub fn is_terminator(&self, byte: u8) -> bool {
        byte == self.terminator || self.alt_terminator == Some(byte)
    }

    pub fn padding(&self, kind: FieldKind) -> Padding {
        match kind {
            FieldKind::Display => self.display_padding,
            FieldKind::Script => self.script_padding,
        }
    }
}

/// Result of decoding one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    /// Bytes read, terminator excluded. A variable prefix in the last
    /// allowed byte still takes its argument byte, so this can be one more
    /// than the requested maximum.
    pub consumed: usize,
    /// Bytes without a table entry, in order, emitted as `\xNN`.
    pub escaped: Vec<u8>,
}

/// Result of encoding one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// Characters skipped because no token matched them.
    pub dropped: Vec<char>,
}

impl Encoded {
    pub fn is_lossless(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Parse a `\xNN` style escape of the given kind at the start of `s`.
fn leading_escape(s: &str, kind: char) -> Option<u8> {
    let mut chars = s.chars();
    if chars.next() != Some('\\') || chars.next() != Some(kind) {
        return None;
    }
    let digits = s.get(2..4)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

#[derive(Debug, Clone)]
pub struct TextCodec {
    table: CharacterTable,
    conventions: TextConventions,
    unmatched: UnmatchedPolicy,
}

impl TextCodec {
    pub fn new(table: CharacterTable, conventions: TextConventions) -> Self {
        TextCodec {
            table,
            conventions,
            unmatched: UnmatchedPolicy::default(),
        }
    }

    pub fn with_unmatched_policy(mut self, policy: UnmatchedPolicy) -> Self {
        self.unmatched = policy;
        self
    }

    pub fn table(&self) -> &CharacterTable {
        &self.table
    }

    pub fn conventions(&self) -> &TextConventions {
        &self.conventions
    }

    /// Decode at most `max_len` bytes starting at `offset`.
    ///
    /// Table entries win over terminators, so a terminator code that the
    /// table maps is decoded as text.
    pub fn decode(&self, bytes: &[u8], offset: usize, max_len: usize) -> Decoded {
        let end = offset.saturating_add(max_len).min(bytes.len());
        let mut text = String::new();
        let mut escaped = Vec::new();
        let mut pos = offset;

        while pos < end {
            let byte = bytes[pos];
            if let Some(token) = self.table.lookup(byte) {
                text.push_str(token);
                pos += 1;
                continue;
            }
            if self.conventions.is_terminator(byte) {
                break;
            }
            if self.conventions.variable_prefix == Some(byte) && pos + 1 < bytes.len() {
                let _ = write!(text, "\\v{:02X}", bytes[pos + 1]);
                pos += 2;
                continue;
            }
            let _ = write!(text, "\\x{:02X}", byte);
            escaped.push(byte);
            pos += 1;
        }

        if !escaped.is_empty() {
            trace!(
                "{} unmapped byte(s) escaped in string at {:#X}",
                escaped.len(),
                offset
            );
        }

        Decoded {
            text,
            consumed: pos.saturating_sub(offset),
            escaped,
        }
    }

    /// Greedy longest-match encoding.
    ///
    /// `\xNN` emits a literal byte and, when the conventions have a variable
    /// prefix, `\vNN` emits the prefix followed by `NN`.
    pub fn encode(&self, text: &str) -> Result<Encoded> {
        let window = self
            .conventions
            .window
            .unwrap_or_else(|| self.table.longest_token());
        let mut bytes = Vec::with_capacity(text.len());
        let mut dropped = Vec::new();
        let mut rest = text;
        let mut position = 0usize;

        while !rest.is_empty() {
            if let Some(byte) = leading_escape(rest, 'x') {
                bytes.push(byte);
                rest = &rest[4..];
                position += 4;
                continue;
            }
            if let Some(prefix) = self.conventions.variable_prefix {
                if let Some(arg) = leading_escape(rest, 'v') {
                    bytes.push(prefix);
                    bytes.push(arg);
                    rest = &rest[4..];
                    position += 4;
                    continue;
                }
            }

            let mut ends = Vec::with_capacity(window);
            for (count, (idx, ch)) in rest.char_indices().enumerate() {
                if count == window {
                    break;
                }
                ends.push(idx + ch.len_utf8());
            }

            let matched = ends
                .iter()
                .enumerate()
                .rev()
                .find_map(|(n, &end)| self.table.reverse(&rest[..end]).map(|b| (b, end, n + 1)));

            match matched {
                Some((byte, end, chars)) => {
                    bytes.push(byte);
                    rest = &rest[end..];
                    position += chars;
                }
                None => {
                    let Some(ch) = rest.chars().next() else {
                        break;
                    };
                    if self.unmatched == UnmatchedPolicy::Reject {
                        return Err(RomError::Unencodable { ch, position });
                    }
                    trace!("dropping unencodable {:?} at character {}", ch, position);
                    dropped.push(ch);
                    rest = &rest[ch.len_utf8()..];
                    position += 1;
                }
            }
        }

        if !dropped.is_empty() {
            debug!(
                "{} character(s) dropped while encoding {:?}",
                dropped.len(),
                text
            );
        }

        Ok(Encoded { bytes, dropped })
    }

    pub fn encoded_len(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.bytes.len())
    }

    pub fn read_fixed_length(&self, image: &[u8], offset: usize, len: usize) -> String {
        self.decode(image, offset, len).text
    }

    pub fn read_variable_length(&self, image: &[u8], offset: usize) -> String {
        self.decode(image, offset, usize::MAX).text
    }

    /// Bytes before the first terminator at `offset` (or the image end).
    pub fn length_of_string_at(&self, image: &[u8], offset: usize) -> usize {
        image
            .get(offset..)
            .map(|tail| {
                tail.iter()
                    .position(|&b| self.conventions.is_terminator(b))
                    .unwrap_or(tail.len())
            })
            .unwrap_or(0)
    }

    /// Encode `text` into exactly `len` bytes at `offset`, truncating or
    /// padding as the field kind requires.
    pub fn write_fixed_length(
        &self,
        image: &mut [u8],
        text: &str,
        offset: usize,
        len: usize,
        kind: FieldKind,
    ) -> Result<Encoded> {
        let range = check_span(image.len(), offset, len)?;
        let encoded = self.encode(text)?;
        let field = &mut image[range];

        let mut n = encoded.bytes.len().min(len);
        if n < encoded.bytes.len() {
            debug!(
                "{:?} truncated from {} to {} bytes at {:#X}",
                text,
                encoded.bytes.len(),
                len,
                offset
            );
        }
        field[..n].copy_from_slice(&encoded.bytes[..n]);

        match self.conventions.padding(kind) {
            Padding::Repeat(byte) => field[n..].fill(byte),
            Padding::TerminateThenFill { terminator, fill } => {
                if n < len {
                    field[n] = terminator;
                    n += 1;
                }
                field[n..].fill(fill);
            }
        }

        Ok(encoded)
    }

    /// Encode `text` followed by the terminator. Returns the bytes written.
    pub fn write_variable_length(&self, image: &mut [u8], text: &str, offset: usize) -> Result<usize> {
        let encoded = self.encode(text)?;
        let total = encoded.bytes.len() + 1;
        let range = check_span(image.len(), offset, total)?;
        let dest = &mut image[range];
        dest[..encoded.bytes.len()].copy_from_slice(&encoded.bytes);
        dest[encoded.bytes.len()] = self.conventions.terminator;
        Ok(total)
    }
}
