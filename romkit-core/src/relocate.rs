//! Moving a record that outgrew its slot into free space.

use std::collections::BTreeSet;

use log::debug;

use crate::address::PointerFormat;
use crate::free_space::FreeSpaceAllocator;
use crate::image::{check_span, RomImage};
use crate::{Result, RomError};

/// How far around a known pointer site copies of the same pointer are looked for.
pub const POINTER_SEARCH_RADIUS: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct RelocationRequest<'a> {
    /// Bytes of the record in its new form, terminator included.
    pub data: &'a [u8],
    /// Locations of pointers that must be redirected to the new copy.
    pub pointer_sites: &'a [usize],
    /// Also redirect every copy of the first site's current pointer bytes
    /// found within this many bytes of it.
    pub search_radius: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocated {
    pub offset: usize,
    pub rewritten: Vec<usize>,
    /// Where each rewritten site pointed before, in the same order.
    pub previous: Vec<usize>,
}

/// Copy `request.data` into free space and repoint every site at it.
///
/// Every site must already hold a pointer. All checks happen before the
/// first write, so on error the image is unchanged.
pub fn relocate<F: PointerFormat>(
    image: &mut RomImage,
    format: &F,
    allocator: &FreeSpaceAllocator,
    request: &RelocationRequest<'_>,
) -> Result<Relocated> {
    let width = format.width();
    let mut sites: BTreeSet<usize> = BTreeSet::new();
    for &site in request.pointer_sites {
        check_span(image.len(), site, width)?;
        sites.insert(site);
    }

    if let (Some(radius), Some(&primary)) = (request.search_radius, request.pointer_sites.first()) {
        let needle = image.slice(primary, width)?.to_vec();
        let low = primary.saturating_sub(radius);
        let high = primary.saturating_add(radius).min(image.len());
        sites.extend(image.search_range(low, high, &needle));
    }

    let region = allocator.find(image, request.data.len())?;
    for &site in &sites {
        if !format.reaches(site, region.offset) {
            return Err(RomError::Unreachable {
                site,
                target: region.offset,
            });
        }
    }

    let mut previous = Vec::with_capacity(sites.len());
    for &site in &sites {
        previous.push(format.decode(image, site)?);
    }

    image.write_bytes(region.offset, request.data)?;
    for (&site, &old) in sites.iter().zip(&previous) {
        let encoded = format.encode(region.offset, site);
        image.write_bytes(site, &encoded)?;
        debug!("pointer at {:#X}: {:#X} -> {:#X}", site, old, region.offset);
    }

    debug!(
        "relocated {} bytes to {:#X}, {} pointer(s) rewritten",
        request.data.len(),
        region.offset,
        sites.len()
    );

    Ok(Relocated {
        offset: region.offset,
        rewritten: sites.into_iter().collect(),
        previous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Banked, Flat};
    use test_log::test;

    fn gba_image() -> RomImage {
        let mut bytes = vec![0x00; 0x400];
        bytes[0x200..].fill(0xFF);
        RomImage::new(bytes)
    }

    #[test]
    fn moves_data_and_rewrites_listed_pointers() {
        let mut image = gba_image();
        let gba = Flat::GAME_BOY_ADVANCE;
        gba.write_pointer(&mut image, 0x10, 0x80).unwrap();

        let allocator = FreeSpaceAllocator::new(0xFF, 0x200).with_guard(2);
        let data = [1, 2, 3, 4, 0xFF, 0xFF];
        let moved = relocate(
            &mut image,
            &gba,
            &allocator,
            &RelocationRequest {
                data: &data,
                pointer_sites: &[0x10],
                search_radius: None,
            },
        )
        .unwrap();

        assert_eq!(moved.offset, 0x202);
        assert_eq!(moved.rewritten, vec![0x10]);
        assert_eq!(moved.previous, vec![0x80]);
        assert_eq!(&image[0x202..0x208], &data);
        assert_eq!(gba.read_pointer(&image, 0x10).unwrap(), 0x202);
    }

    #[test]
    fn copies_of_the_pointer_nearby_are_rewritten() {
        let mut image = gba_image();
        let gba = Flat::GAME_BOY_ADVANCE;
        for site in [0x10, 0x40, 0x1F0] {
            gba.write_pointer(&mut image, site, 0x80).unwrap();
        }

        let allocator = FreeSpaceAllocator::new(0xFF, 0x200);
        let moved = relocate(
            &mut image,
            &gba,
            &allocator,
            &RelocationRequest {
                data: &[9, 9, 0xFF],
                pointer_sites: &[0x10],
                search_radius: Some(0x100),
            },
        )
        .unwrap();

        assert_eq!(moved.rewritten, vec![0x10, 0x40]);
        assert_eq!(moved.previous, vec![0x80, 0x80]);
        assert_eq!(gba.read_pointer(&image, 0x40).unwrap(), moved.offset);
        assert_eq!(gba.read_pointer(&image, 0x1F0).unwrap(), 0x80);
    }

    #[test]
    fn full_image_is_left_untouched() {
        let mut image = gba_image();
        let before = image.clone();
        let allocator = FreeSpaceAllocator::new(0xFF, 0x200);
        let data = vec![0u8; 0x201];
        let err = relocate(
            &mut image,
            &Flat::GAME_BOY_ADVANCE,
            &allocator,
            &RelocationRequest {
                data: &data,
                pointer_sites: &[0x10],
                search_radius: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, RomError::NoFreeSpace { .. }));
        assert_eq!(image, before);
    }

    #[test]
    fn banked_pointers_cannot_leave_their_bank() {
        let mut bytes = vec![0x00; 0x10000];
        bytes[0xC000..].fill(0xFF);
        let mut image = RomImage::new(bytes);
        let before = image.clone();
        let allocator = FreeSpaceAllocator::new(0xFF, 0x4000);
        let err = relocate(
            &mut image,
            &Banked::GAME_BOY,
            &allocator,
            &RelocationRequest {
                data: &[1, 2, 3],
                pointer_sites: &[0x8100],
                search_radius: None,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RomError::Unreachable {
                site: 0x8100,
                target: 0xC000
            }
        ));
        assert_eq!(image, before);
    }
}
