//! Pointer <-> file offset translation.
//!
//! Two schemes exist. [`Banked`] is the 8-bit handheld layout: 16-bit
//! pointers that are either global (bank 0) or relative to the bank they are
//! read from. [`Flat`] is the 32-bit layout: little-endian pointers into a
//! linear address space whose top byte carries a fixed load-address bias.
//!
//! Out-of-range inputs are programmer errors. They trip a `debug_assert!` in
//! debug builds; release builds return the raw arithmetic result, which lands
//! outside the image and fails the caller's bounds check.

use crate::image::RomImage;
use crate::Result;

/// Bank size of the 8-bit handheld cartridges.
pub const GB_BANK_SIZE: usize = 0x4000;

/// Top-byte bias of 32-bit handheld pointers (cartridge space starts at 0x0800_0000).
pub const GBA_POINTER_BIAS: u8 = 0x08;

/// Wire format of a pointer stored inside the image, used when pointers have
/// to be rewritten without knowing which scheme produced them.
pub trait PointerFormat {
    /// Encoded size in bytes.
    fn width(&self) -> usize;

    /// Read the pointer stored at `site` and resolve it to a file offset.
    fn decode(&self, image: &RomImage, site: usize) -> Result<usize>;

    /// Encode `target` for storage at `site`.
    fn encode(&self, target: usize, site: usize) -> Vec<u8>;

    /// Whether a pointer stored at `site` is able to address `target`.
    fn reaches(&self, _site: usize, _target: usize) -> bool {
        true
    }
}

/// Banked 16-bit addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Banked {
    bank_size: usize,
}

impl Banked {
    pub const GAME_BOY: Banked = Banked {
        bank_size: GB_BANK_SIZE,
    };

    /// `bank_size` must be non-zero and at most 0x8000 so that the switchable
    /// window `bank_size..2*bank_size` still fits a 16-bit pointer.
    pub const fn new(bank_size: usize) -> Self {
        assert!(bank_size > 0 && bank_size <= 0x8000);
        Banked { bank_size }
    }

    pub fn bank_size(&self) -> usize {
        self.bank_size
    }

    /// Linear offset of `pointer` as seen from `bank`.
    pub fn to_linear(&self, bank: usize, pointer: u16) -> usize {
        let pointer = pointer as usize;
        if pointer < self.bank_size {
            pointer
        } else {
            (pointer % self.bank_size) + bank * self.bank_size
        }
    }

    pub fn to_bank(&self, offset: usize) -> usize {
        offset / self.bank_size
    }

    /// Smallest pointer that reaches `offset` from `bank`.
    pub fn to_pointer(&self, bank: usize, offset: usize) -> u16 {
        debug_assert!(
            offset < self.bank_size || self.to_bank(offset) == bank,
            "offset {:#X} is not addressable from bank {:#X}",
            offset,
            bank
        );
        if offset < self.bank_size {
            offset as u16
        } else {
            ((offset % self.bank_size) + self.bank_size) as u16
        }
    }

    /// Read the 16-bit pointer at `at` and resolve it against `bank`.
    pub fn read_pointer(&self, image: &RomImage, at: usize, bank: usize) -> Result<usize> {
        let pointer = image.read_u16_le(at)?;
        Ok(self.to_linear(bank, pointer))
    }

    /// Read the pointer at `at`, resolving it against the bank it is stored in.
    pub fn read_local_pointer(&self, image: &RomImage, at: usize) -> Result<usize> {
        self.read_pointer(image, at, self.to_bank(at))
    }

    pub fn write_pointer(&self, image: &mut RomImage, at: usize, offset: usize) -> Result<()> {
        let pointer = self.to_pointer(self.to_bank(offset), offset);
        image.write_u16_le(at, pointer)
    }
}

impl Default for Banked {
    fn default() -> Self {
        Banked::GAME_BOY
    }
}

impl PointerFormat for Banked {
    fn width(&self) -> usize {
        2
    }

    fn decode(&self, image: &RomImage, site: usize) -> Result<usize> {
        self.read_local_pointer(image, site)
    }

    fn encode(&self, target: usize, _site: usize) -> Vec<u8> {
        self.to_pointer(self.to_bank(target), target)
            .to_le_bytes()
            .to_vec()
    }

    fn reaches(&self, site: usize, target: usize) -> bool {
        target < self.bank_size || self.to_bank(target) == self.to_bank(site)
    }
}

/// Flat 32-bit addressing with a biased top byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flat {
    bias: u8,
}

impl Flat {
    pub const GAME_BOY_ADVANCE: Flat = Flat {
        bias: GBA_POINTER_BIAS,
    };

    pub const fn new(bias: u8) -> Self {
        Flat { bias }
    }

    pub fn bias(&self) -> u8 {
        self.bias
    }

    pub fn to_linear(&self, pointer: u32) -> usize {
        let top = (pointer >> 24) as u8;
        debug_assert!(
            top >= self.bias,
            "pointer {:#010X} is below the load address",
            pointer
        );
        let top = top.wrapping_sub(self.bias) as usize;
        (top << 24) | (pointer & 0x00FF_FFFF) as usize
    }

    pub fn to_pointer(&self, offset: usize) -> u32 {
        debug_assert!(
            offset as u64 <= u32::MAX as u64,
            "offset {:#X} does not fit a 32-bit pointer",
            offset
        );
        let top = ((offset >> 24) as u8).wrapping_add(self.bias) as u32;
        (top << 24) | (offset as u32 & 0x00FF_FFFF)
    }

    /// Whether `value` looks like a pointer into an image of `image_len` bytes.
    pub fn is_pointer(&self, value: u32, image_len: usize) -> bool {
        let top = (value >> 24) as u8;
        top >= self.bias && self.to_linear(value) < image_len
    }

    pub fn read_pointer(&self, image: &RomImage, at: usize) -> Result<usize> {
        Ok(self.to_linear(image.read_u32_le(at)?))
    }

    pub fn write_pointer(&self, image: &mut RomImage, at: usize, offset: usize) -> Result<()> {
        image.write_u32_le(at, self.to_pointer(offset))
    }
}

impl Default for Flat {
    fn default() -> Self {
        Flat::GAME_BOY_ADVANCE
    }
}

impl PointerFormat for Flat {
    fn width(&self) -> usize {
        4
    }

    fn decode(&self, image: &RomImage, site: usize) -> Result<usize> {
        self.read_pointer(image, site)
    }

    fn encode(&self, target: usize, _site: usize) -> Vec<u8> {
        self.to_pointer(target).to_le_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn home_bank_pointers_are_global() {
        let gb = Banked::GAME_BOY;
        assert_eq!(gb.to_linear(0, 0x1234), 0x1234);
        assert_eq!(gb.to_linear(0x1F, 0x1234), 0x1234);
        assert_eq!(gb.to_pointer(0, 0x3FFF), 0x3FFF);
    }

    #[test]
    fn switchable_pointers_are_rebased_into_their_bank() {
        let gb = Banked::GAME_BOY;
        assert_eq!(gb.to_linear(0x0E, 0x4000), 0x38000);
        assert_eq!(gb.to_linear(0x0E, 0x7ABC), 0x3BABC);
        assert_eq!(gb.to_bank(0x3BABC), 0x0E);
        assert_eq!(gb.to_pointer(0x0E, 0x3BABC), 0x7ABC);
    }

    #[test]
    fn banked_pointer_round_trip_through_image() {
        let gb = Banked::GAME_BOY;
        let mut image = RomImage::new(vec![0; 0x10000]);
        gb.write_pointer(&mut image, 0x8010, 0x9ABC).unwrap();
        assert_eq!(image.read_u16_le(0x8010).unwrap(), 0x5ABC);
        assert_eq!(gb.read_local_pointer(&image, 0x8010).unwrap(), 0x9ABC);
        // Read from a different bank the same bytes land elsewhere.
        assert_eq!(gb.read_pointer(&image, 0x8010, 3).unwrap(), 0xDABC);
    }

    #[test]
    fn banked_reachability() {
        let gb = Banked::GAME_BOY;
        assert!(gb.reaches(0x8000, 0x0100));
        assert!(gb.reaches(0x8000, 0xBFFF));
        assert!(!gb.reaches(0x8000, 0xC000));
    }

    #[test]
    fn decoding_through_the_trait_is_bounds_checked() {
        let mut image = RomImage::new(vec![0; 0x8002]);
        image.write_u16_le(0x4000, 0x5234).unwrap();
        image.write_u32_le(0x10, 0x0800_0123).unwrap();

        assert_eq!(Banked::GAME_BOY.decode(&image, 0x4000).unwrap(), 0x5234);
        assert_eq!(Flat::GAME_BOY_ADVANCE.decode(&image, 0x10).unwrap(), 0x123);
        assert!(matches!(
            Banked::GAME_BOY.decode(&image, 0x8001),
            Err(crate::RomError::OutOfBounds { offset: 0x8001, len: 2, .. })
        ));
        assert!(Flat::GAME_BOY_ADVANCE.decode(&image, 0x7FFF).is_err());
    }

    #[test]
    fn flat_pointers_strip_the_bias() {
        let gba = Flat::GAME_BOY_ADVANCE;
        assert_eq!(gba.to_linear(0x0812_3456), 0x12_3456);
        assert_eq!(gba.to_linear(0x0900_0010), 0x100_0010);
        assert_eq!(gba.to_pointer(0x3C_0000), 0x083C_0000);
        assert!(gba.is_pointer(0x0800_0100, 0x200));
        assert!(!gba.is_pointer(0x0800_0300, 0x200));
        assert!(!gba.is_pointer(0x0000_0100, 0x200));
    }

    #[test]
    fn flat_pointer_round_trip_through_image() {
        let gba = Flat::GAME_BOY_ADVANCE;
        let mut image = RomImage::new(vec![0; 64]);
        gba.write_pointer(&mut image, 8, 0xABCDEF).unwrap();
        assert_eq!(&image[8..12], &[0xEF, 0xCD, 0xAB, 0x08]);
        assert_eq!(gba.read_pointer(&image, 8).unwrap(), 0xABCDEF);
    }

    proptest! {
        #[test]
        fn banked_low_pointers_ignore_bank(offset in 0usize..GB_BANK_SIZE, bank in 0usize..0x80) {
            prop_assert_eq!(Banked::GAME_BOY.to_linear(bank, offset as u16), offset);
        }

        #[test]
        fn banked_pointer_keeps_bank(offset in GB_BANK_SIZE..0x20_0000usize) {
            let gb = Banked::GAME_BOY;
            let bank = gb.to_bank(offset);
            let pointer = gb.to_pointer(bank, offset);
            prop_assert_eq!(gb.to_linear(bank, pointer), offset);
            prop_assert_eq!(gb.to_bank(gb.to_linear(bank, pointer)), bank);
        }

        #[test]
        fn flat_round_trip(offset in 0usize..(1 << 24)) {
            let gba = Flat::GAME_BOY_ADVANCE;
            prop_assert_eq!(gba.to_linear(gba.to_pointer(offset)), offset);
        }
    }
}
