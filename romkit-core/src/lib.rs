//! Binary editing core for cartridge-era game images.
//!
//! Everything here works on a [`RomImage`] (or a plain byte slice borrowed
//! from one): schema profiles say where records live, the text codec turns
//! embedded strings into editable text and back, the address translators
//! convert pointers into file offsets, the free-space finder makes room for
//! records that outgrow their slot, and the patch engine applies IPS files.
//! Deciding *what* to change is left to the per-revision handlers built on
//! top of this crate.

use thiserror::Error;

pub mod address;
pub mod config;
pub mod free_space;
pub mod image;
pub mod patch;
pub mod relocate;
pub mod schema;
pub mod text;

pub use address::{Banked, Flat, PointerFormat};
pub use config::ConfigDir;
pub use free_space::{find_free_space, FreeSpaceAllocator, FreeSpaceRegion};
pub use image::RomImage;
pub use patch::{apply_patch, PatchBuilder, PatchError, PatchSummary};
pub use schema::{SchemaDialect, SchemaEntry, SchemaRegistry};
pub use text::{CharacterTable, TextCodec, TextConventions};

#[derive(Debug, Error)]
pub enum RomError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("access of {len} bytes at {offset:#X} is outside the image ({image_len} bytes)")]
    OutOfBounds {
        offset: usize,
        len: usize,
        image_len: usize,
    },

    #[error("no free space for {needed} bytes at or after {floor:#X}")]
    NoFreeSpace { needed: usize, floor: usize },

    #[error("pointer at {site:#X} cannot reach offset {target:#X}")]
    Unreachable { site: usize, target: usize },

    #[error("no table entry for {ch:?} at character {position}")]
    Unencodable { ch: char, position: usize },

    #[error("patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RomError>;
