use log::debug;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaEntry;
use crate::{Result, RomError};

/// Padding byte of unused space in 32-bit handheld images.
pub const GBA_FREE_SPACE_BYTE: u8 = 0xFF;

/// Bytes kept in front of a relocated block so that the terminator of
/// whatever precedes the free run survives.
pub const DEFAULT_GUARD: usize = 2;

/// A run of sentinel bytes inside the image.
///
/// Nothing is reserved: the caller must fill the region before asking for
/// another one, or the next search may hand out overlapping space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSpaceRegion {
    pub offset: usize,
    pub len: usize,
}

impl FreeSpaceRegion {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// First-fit scan for `needed` consecutive `sentinel` bytes at or after `floor`.
pub fn find_free_space(
    image: &[u8],
    sentinel: u8,
    needed: usize,
    floor: usize,
) -> Option<FreeSpaceRegion> {
    if floor > image.len() {
        return None;
    }
    if needed == 0 {
        return Some(FreeSpaceRegion {
            offset: floor,
            len: 0,
        });
    }

    let mut run = 0usize;
    for (i, &byte) in image[floor..].iter().enumerate() {
        if byte != sentinel {
            run = 0;
            continue;
        }
        run += 1;
        if run == needed {
            return Some(FreeSpaceRegion {
                offset: floor + i + 1 - needed,
                len: needed,
            });
        }
    }

    debug!(
        "no run of {} x {:#04X} at or after {:#X}",
        needed, sentinel, floor
    );
    None
}

/// Like [`find_free_space`], but the run must also cover `guard` sentinel
/// bytes in front of the returned region.
pub fn find_free_space_guarded(
    image: &[u8],
    sentinel: u8,
    needed: usize,
    floor: usize,
    guard: usize,
) -> Option<FreeSpaceRegion> {
    let total = needed.checked_add(guard)?;
    find_free_space(image, sentinel, total, floor).map(|region| FreeSpaceRegion {
        offset: region.offset + guard,
        len: needed,
    })
}

/// Search settings for one revision: sentinel, floor and guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpaceAllocator {
    sentinel: u8,
    floor: usize,
    guard: usize,
}

impl FreeSpaceAllocator {
    pub fn new(sentinel: u8, floor: usize) -> Self {
        FreeSpaceAllocator {
            sentinel,
            floor,
            guard: 0,
        }
    }

    /// Floor taken from the entry's `FreeSpace` value, with the default guard.
    pub fn from_schema(entry: &SchemaEntry, sentinel: u8) -> Self {
        let floor = usize::try_from(entry.value("FreeSpace")).unwrap_or(0);
        FreeSpaceAllocator::new(sentinel, floor).with_guard(DEFAULT_GUARD)
    }

    pub fn with_guard(mut self, guard: usize) -> Self {
        self.guard = guard;
        self
    }

    pub fn sentinel(&self) -> u8 {
        self.sentinel
    }

    pub fn floor(&self) -> usize {
        self.floor
    }

    pub fn guard(&self) -> usize {
        self.guard
    }

    pub fn find(&self, image: &[u8], needed: usize) -> Result<FreeSpaceRegion> {
        find_free_space_guarded(image, self.sentinel, needed, self.floor, self.guard).ok_or(
            RomError::NoFreeSpace {
                needed,
                floor: self.floor,
            },
        )
    }
}
