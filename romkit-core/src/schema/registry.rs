use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::builder::{EntryBuilder, SchemaDialect};
use super::entry::SchemaEntry;
use super::parse::{parse_line, Line, SchemaLineError};
use crate::config::ConfigDir;
use crate::Result;

/// Where identifying fields sit in a cartridge header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderLayout {
    pub rom_code: usize,
    pub rom_code_len: usize,
    pub version: usize,
    pub non_japanese: Option<usize>,
    /// Big-endian 16-bit header checksum.
    pub crc: Option<usize>,
}

impl HeaderLayout {
    pub const fn game_boy() -> Self {
        HeaderLayout {
            rom_code: 0x13F,
            rom_code_len: 4,
            version: 0x14C,
            non_japanese: Some(0x14A),
            crc: Some(0x14E),
        }
    }

    pub const fn game_boy_advance() -> Self {
        HeaderLayout {
            rom_code: 0xAC,
            rom_code_len: 4,
            version: 0xBC,
            non_japanese: None,
            crc: None,
        }
    }
}

/// Every revision profile of one config file, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    entries: Vec<SchemaEntry>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str, dialect: SchemaDialect) -> Self {
        let mut registry = SchemaRegistry::new();
        registry.extend_from_str(text, dialect);
        registry
    }

    /// Read `<name>.ini` from `config`.
    pub fn load(config: &ConfigDir, name: &str, dialect: SchemaDialect) -> Result<Self> {
        let text = config.schema_text(name)?;
        let registry = SchemaRegistry::parse(&text, dialect);
        info!("loaded {} revision profile(s) from {}.ini", registry.len(), name);
        Ok(registry)
    }

    /// Append the sections in `text`. Sections can copy from any entry
    /// already in the registry. Returns the number of entries added.
    pub fn extend_from_str(&mut self, text: &str, dialect: SchemaDialect) -> usize {
        let before = self.entries.len();
        let mut current: Option<EntryBuilder> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            match parse_line(raw_line) {
                None => {}
                Some(Line::Section(name)) => {
                    if let Some(done) = current.take() {
                        self.push(done);
                    }
                    current = Some(EntryBuilder::new(name, dialect));
                }
                Some(Line::Pair { key, value }) => match current.as_mut() {
                    Some(builder) => builder.apply(line_no, key, value),
                    None => warn!(
                        "{}",
                        SchemaLineError::OutsideSection {
                            line: line_no,
                            key: key.to_string(),
                        }
                    ),
                },
                Some(Line::Invalid(text)) => warn!(
                    "{}",
                    SchemaLineError::MissingEquals {
                        line: line_no,
                        text: text.to_string(),
                    }
                ),
            }
        }

        if let Some(done) = current.take() {
            self.push(done);
        }
        self.entries.len() - before
    }

    fn push(&mut self, builder: EntryBuilder) {
        debug!("resolving [{}]", builder.name());
        let entry = builder.freeze(&self.entries);
        self.entries.push(entry);
    }

    /// First entry named `name`, ignoring ASCII case.
    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name().eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick the entry describing `image`.
    ///
    /// Entries tied to the header checksum are preferred, then entries that
    /// accept any checksum. Header fields the layout lacks are not compared.
    pub fn identify(&self, image: &[u8], layout: &HeaderLayout) -> Option<&SchemaEntry> {
        let code = image.get(layout.rom_code..layout.rom_code + layout.rom_code_len)?;
        let version = i64::from(*image.get(layout.version)?);
        let non_japanese = match layout.non_japanese {
            Some(at) => Some(i64::from(*image.get(at)?)),
            None => None,
        };
        let crc = match layout.crc {
            Some(at) => {
                let bytes = image.get(at..at + 2)?;
                Some(u16::from_be_bytes([bytes[0], bytes[1]]))
            }
            None => None,
        };

        let header_matches = |entry: &&SchemaEntry| {
            entry.rom_code().map_or(false, |rc| rc.as_bytes() == code)
                && entry.version() == version
                && non_japanese.map_or(true, |nj| entry.non_japanese == nj)
        };

        let found = crc
            .and_then(|crc| {
                self.entries
                    .iter()
                    .filter(header_matches)
                    .find(|entry| entry.crc_in_header() == Some(crc))
            })
            .or_else(|| {
                self.entries
                    .iter()
                    .filter(header_matches)
                    .find(|entry| entry.crc_in_header().is_none())
            });

        match found {
            Some(entry) => debug!("image identified as [{}]", entry.name()),
            None => debug!(
                "no entry for rom code {:?} version {}",
                String::from_utf8_lossy(code),
                version
            ),
        }
        found
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<'a> IntoIterator for &'a SchemaRegistry {
    type Item = &'a SchemaEntry;
    type IntoIter = std::slice::Iter<'a, SchemaEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const GEN2: &str = r#"
// Generation 2 offsets
[Gold (U)]
Game=AAUE
Version=0
NonJapanese=1
Type=GS
TableFile=gsc_english
PokemonStatsOffset=0x51424
TMMovesOffset=[0x1167A, 0x1167B]
StaticPokemon[]=[0x5730, 0x5731]
TMText[]=[6,0x1234,That's %m!]

[Silver (U)]
Game=AAXE
Version=0
NonJapanese=1
CopyFrom=gold (u)
CopyStaticPokemon=1
PokemonStatsOffset=0x51400 // own value wins

[Gold (U) 1.1]
Game=AAUE
Version=0
NonJapanese=1
CRCInHeader=0xBEEF
CopyFrom=Gold (U)
bogus line
"#;

    fn header(code: &[u8], version: u8, non_japanese: u8, crc: u16) -> Vec<u8> {
        let mut image = vec![0u8; 0x200];
        image[0x13F..0x143].copy_from_slice(code);
        image[0x14C] = version;
        image[0x14A] = non_japanese;
        image[0x14E..0x150].copy_from_slice(&crc.to_be_bytes());
        image
    }

    #[test]
    fn parses_sections_in_order() {
        let registry = SchemaRegistry::parse(GEN2, SchemaDialect::GAME_BOY);
        let names: Vec<&str> = registry.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Gold (U)", "Silver (U)", "Gold (U) 1.1"]);

        let silver = registry.get("SILVER (U)").unwrap();
        assert_eq!(silver.value("PokemonStatsOffset"), 0x51400);
        assert_eq!(silver.array("TMMovesOffset"), &[0x1167A, 0x1167B]);
        assert_eq!(silver.static_records().len(), 2);
        assert!(silver.text_patches().is_empty());
        assert_eq!(silver.table_file(), Some("gsc_english"));
    }

    #[test]
    fn identify_prefers_checksum_specific_entries() {
        let registry = SchemaRegistry::parse(GEN2, SchemaDialect::GAME_BOY);
        let layout = HeaderLayout::game_boy();

        let exact = header(b"AAUE", 0, 1, 0xBEEF);
        assert_eq!(registry.identify(&exact, &layout).unwrap().name(), "Gold (U) 1.1");

        let generic = header(b"AAUE", 0, 1, 0x1234);
        assert_eq!(registry.identify(&generic, &layout).unwrap().name(), "Gold (U)");

        let japanese = header(b"AAUE", 0, 0, 0x1234);
        assert!(registry.identify(&japanese, &layout).is_none());
        assert!(registry.identify(&[0u8; 16], &layout).is_none());
    }

    #[test]
    fn identify_without_checksum_field() {
        let registry = SchemaRegistry::parse(
            "[Ruby (U)]\nGame=AXVE\nVersion=1\n",
            SchemaDialect::GAME_BOY_ADVANCE,
        );
        let mut image = vec![0u8; 0x100];
        image[0xAC..0xB0].copy_from_slice(b"AXVE");
        image[0xBC] = 1;
        let layout = HeaderLayout::game_boy_advance();
        assert_eq!(registry.identify(&image, &layout).unwrap().name(), "Ruby (U)");
        image[0xBC] = 0;
        assert!(registry.identify(&image, &layout).is_none());
    }

    #[test]
    fn keys_before_any_section_are_ignored() {
        let registry = SchemaRegistry::parse("Orphan=1\n[A]\nK=2\n", SchemaDialect::GAME_BOY);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("A").unwrap().get("Orphan"), None);
    }

    #[test]
    fn later_text_can_copy_from_earlier_entries() {
        let mut registry = SchemaRegistry::parse("[A]\nK=7\n", SchemaDialect::GAME_BOY);
        let added = registry.extend_from_str("[B]\nCopyFrom=A\n", SchemaDialect::GAME_BOY);
        assert_eq!(added, 1);
        assert_eq!(registry.get("b").unwrap().value("K"), 7);
    }

    #[test]
    fn json_snapshot_round_trip() {
        let registry = SchemaRegistry::parse(GEN2, SchemaDialect::GAME_BOY);
        let json = registry.to_json().unwrap();
        assert_eq!(SchemaRegistry::from_json(&json).unwrap(), registry);
    }
}
