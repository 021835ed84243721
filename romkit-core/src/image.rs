use std::fmt;
use std::fs;
use std::ops::{Deref, DerefMut, Range};
use std::path::Path;

use crate::{Result, RomError};

/// A loaded cartridge image.
///
/// The length is fixed at load time. Records that grow are relocated inside
/// the existing bytes, never appended, so nothing here can resize the buffer.
/// The image derefs to `[u8]`, which is what the codec, free-space finder and
/// patch engine borrow.
#[derive(Clone, PartialEq, Eq)]
pub struct RomImage {
    data: Vec<u8>,
}

/// Outcome of a hex-pattern search that expects exactly one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexSearch {
    NotFound,
    Unique(usize),
    NotUnique(usize),
}

impl HexSearch {
    pub fn unique(self) -> Option<usize> {
        match self {
            HexSearch::Unique(offset) => Some(offset),
            _ => None,
        }
    }
}

/// Validate that `len` bytes at `offset` fit inside a buffer of `total` bytes.
pub(crate) fn check_span(total: usize, offset: usize, len: usize) -> Result<Range<usize>> {
    match offset.checked_add(len) {
        Some(end) if end <= total => Ok(offset..end),
        _ => Err(RomError::OutOfBounds {
            offset,
            len,
            image_len: total,
        }),
    }
}

/// Parse a string of hex digit pairs such as `"0A1bFF"`.
pub fn parse_hex(hex: &str) -> Result<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(RomError::Config(format!(
            "hex string {:?} has an odd number of digits",
            hex
        )));
    }

    let mut out = Vec::with_capacity(hex.len() / 2);
    for i in (0..hex.len()).step_by(2) {
        let pair = hex.get(i..i + 2).ok_or_else(|| {
            RomError::Config(format!("hex string {:?} is not ASCII", hex))
        })?;
        let byte = u8::from_str_radix(pair, 16).map_err(|_| {
            RomError::Config(format!("invalid hex pair {:?} in {:?}", pair, hex))
        })?;
        out.push(byte);
    }
    Ok(out)
}

impl RomImage {
    pub fn new(data: Vec<u8>) -> Self {
        RomImage { data }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        log::debug!("loaded {} ({} bytes)", path.display(), data.len());
        Ok(RomImage::new(data))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, &self.data)?;
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let range = check_span(self.data.len(), offset, len)?;
        Ok(&self.data[range])
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32_le(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let range = check_span(self.data.len(), offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.write_bytes(offset, &[value])
    }

    pub fn write_u16_le(&mut self, offset: usize, value: u16) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    pub fn write_u32_le(&mut self, offset: usize, value: u32) -> Result<()> {
        self.write_bytes(offset, &value.to_le_bytes())
    }

    /// Overwrite `len` bytes at `offset` with `byte`.
    pub fn fill_range(&mut self, offset: usize, len: usize, byte: u8) -> Result<()> {
        let range = check_span(self.data.len(), offset, len)?;
        self.data[range].fill(byte);
        Ok(())
    }

    /// Every offset where `needle` occurs, overlapping hits included.
    pub fn search(&self, needle: &[u8]) -> Vec<usize> {
        self.search_range(0, self.data.len(), needle)
    }

    /// Occurrences of `needle` that lie entirely inside `start..end`.
    pub fn search_range(&self, start: usize, end: usize, needle: &[u8]) -> Vec<usize> {
        let end = end.min(self.data.len());
        if needle.is_empty() || start >= end || end - start < needle.len() {
            return Vec::new();
        }

        self.data[start..end]
            .windows(needle.len())
            .enumerate()
            .filter(|(_, window)| *window == needle)
            .map(|(i, _)| start + i)
            .collect()
    }

    pub fn find_hex(&self, hex: &str) -> Result<HexSearch> {
        let hits = self.find_all_hex(hex)?;
        Ok(match hits.len() {
            0 => HexSearch::NotFound,
            1 => HexSearch::Unique(hits[0]),
            n => HexSearch::NotUnique(n),
        })
    }

    pub fn find_all_hex(&self, hex: &str) -> Result<Vec<usize>> {
        let needle = parse_hex(hex)?;
        Ok(self.search(&needle))
    }

    pub fn write_hex(&mut self, offset: usize, hex: &str) -> Result<()> {
        let bytes = parse_hex(hex)?;
        self.write_bytes(offset, &bytes)
    }

    /// True when the ASCII bytes of `sig` appear verbatim at `offset`.
    pub fn matches_ascii(&self, offset: usize, sig: &str) -> bool {
        match self.slice(offset, sig.len()) {
            Ok(bytes) => bytes == sig.as_bytes(),
            Err(_) => false,
        }
    }
}

impl Deref for RomImage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for RomImage {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl AsRef<[u8]> for RomImage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for RomImage {
    fn from(data: Vec<u8>) -> Self {
        RomImage::new(data)
    }
}

impl fmt::Debug for RomImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RomImage")
            .field("len", &self.data.len())
            .finish()
    }
}
