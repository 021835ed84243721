use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::text::{LineBreaks, TextTemplate};

/// Offsets of one fixed in-game encounter. Most records hold a single
/// offset; paired keys hold two and grouped dialects hold every copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticRecord {
    /// Config key the record came from, e.g. `StaticPokemonGameCorner[]`.
    pub key: String,
    pub offsets: Vec<i64>,
}

/// A text string to rewrite, located by `locator` and rebuilt from `template`.
///
/// The locator is an offset in the 8-bit dialect and a
/// `(map bank, map number, person, offset in script)` tuple in the 32-bit one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPatchDescriptor {
    pub number: i64,
    pub locator: Vec<i64>,
    pub template: TextTemplate,
    #[serde(default)]
    pub is_move_tutor: bool,
}

impl TextPatchDescriptor {
    pub fn render(&self, move_name: &str) -> String {
        self.template.render_move(move_name)
    }

    /// Render and wrap for a text box, keeping `move_name` on one line.
    pub fn render_wrapped<M>(
        &self,
        move_name: &str,
        breaks: LineBreaks<'_>,
        limit: usize,
        measure: M,
    ) -> String
    where
        M: Fn(&str) -> usize,
    {
        self.template
            .render_move_wrapped(move_name, breaks, limit, measure)
    }
}

/// One resolved revision profile. Self-contained after loading: nothing
/// refers back to the profile it was copied from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub(crate) name: String,
    pub(crate) rom_code: Option<String>,
    pub(crate) version: i64,
    pub(crate) non_japanese: i64,
    pub(crate) rom_type: Option<String>,
    pub(crate) table_file: Option<String>,
    pub(crate) extra_table_file: Option<String>,
    pub(crate) crc_in_header: i64,
    pub(crate) code_tweaks: BTreeMap<String, String>,
    pub(crate) scalars: BTreeMap<String, i64>,
    pub(crate) arrays: BTreeMap<String, Vec<i64>>,
    pub(crate) static_records: Vec<StaticRecord>,
    pub(crate) text_patches: Vec<TextPatchDescriptor>,
}

impl SchemaEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scalar value, 0 when the key is absent.
    pub fn value(&self, key: &str) -> i64 {
        self.get(key).unwrap_or(0)
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.scalars.get(key).copied()
    }

    /// Scalar value read as an offset. Negative values read as absent.
    pub fn offset(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| usize::try_from(v).ok())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.value(key) > 0
    }

    /// Integer list, empty when the key is absent.
    pub fn array(&self, key: &str) -> &[i64] {
        self.get_array(key).unwrap_or(&[])
    }

    pub fn get_array(&self, key: &str) -> Option<&[i64]> {
        self.arrays.get(key).map(Vec::as_slice)
    }

    pub fn scalars(&self) -> impl Iterator<Item = (&str, i64)> + '_ {
        self.scalars.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn arrays(&self) -> impl Iterator<Item = (&str, &[i64])> + '_ {
        self.arrays.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn static_records(&self) -> &[StaticRecord] {
        &self.static_records
    }

    /// Static records that came from `key`.
    pub fn static_records_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a StaticRecord> + 'a {
        self.static_records.iter().filter(move |r| r.key == key)
    }

    pub fn text_patches(&self) -> &[TextPatchDescriptor] {
        &self.text_patches
    }

    pub fn rom_code(&self) -> Option<&str> {
        self.rom_code.as_deref()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn is_non_japanese(&self) -> bool {
        self.non_japanese > 0
    }

    pub fn rom_type(&self) -> Option<&str> {
        self.rom_type.as_deref()
    }

    pub fn is_type(&self, rom_type: &str) -> bool {
        self.rom_type
            .as_deref()
            .map_or(false, |t| t.eq_ignore_ascii_case(rom_type))
    }

    pub fn table_file(&self) -> Option<&str> {
        self.table_file.as_deref()
    }

    pub fn extra_table_file(&self) -> Option<&str> {
        self.extra_table_file.as_deref()
    }

    /// Header checksum this entry is tied to, or `None` for any checksum.
    pub fn crc_in_header(&self) -> Option<u16> {
        u16::try_from(self.crc_in_header).ok()
    }

    /// Patch name for a `*Tweak` key.
    pub fn code_tweak(&self, key: &str) -> Option<&str> {
        self.code_tweaks.get(key).map(String::as_str)
    }

    pub fn code_tweaks(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.code_tweaks.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
