use std::collections::BTreeMap;

use log::{debug, warn};

use super::entry::{SchemaEntry, StaticRecord, TextPatchDescriptor};
use super::parse::{int_or_zero, list_body, parse_list, SchemaLineError};
use crate::text::TextTemplate;

const COPY_STATIC: &str = "CopyStaticPokemon";
const COPY_TEXT: &str = "CopyTMText";
const STATIC_SUPPORT: &str = "StaticPokemonSupport";
const PAIRED_STATIC_KEYS: [&str; 2] = ["StaticPokemonGameCorner[]", "StaticPokemonCopy[]"];
const TEXT_PATCH_KEY: &str = "TMText[]";
const TUTOR_TEXT_PATCH_KEY: &str = "MoveTutorText[]";

/// How a list value on a `StaticPokemon*[]` key becomes records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaticRecordMode {
    /// One single-offset record per list element.
    PerValue,
    /// One record holding every element.
    Grouped,
}

/// Per-platform differences in the config grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDialect {
    /// Number of comma separated fields in a text-patch value, template last.
    pub text_patch_arity: usize,
    pub static_records: StaticRecordMode,
}

impl SchemaDialect {
    pub const GAME_BOY: SchemaDialect = SchemaDialect {
        text_patch_arity: 3,
        static_records: StaticRecordMode::PerValue,
    };

    pub const GAME_BOY_ADVANCE: SchemaDialect = SchemaDialect {
        text_patch_arity: 6,
        static_records: StaticRecordMode::Grouped,
    };
}

impl Default for SchemaDialect {
    fn default() -> Self {
        SchemaDialect::GAME_BOY
    }
}

fn is_static_key(key: &str) -> bool {
    key.starts_with("StaticPokemon") && key.ends_with("[]")
}

/// Values collected for one `[Section]` before inheritance is resolved.
///
/// Everything set on the section itself is kept apart from what a parent
/// provides, so the order of `CopyFrom` relative to other keys does not
/// matter: own values always win.
#[derive(Debug, Clone)]
pub(crate) struct EntryBuilder {
    name: String,
    dialect: SchemaDialect,
    parents: Vec<String>,
    rom_code: Option<String>,
    version: Option<i64>,
    non_japanese: Option<i64>,
    rom_type: Option<String>,
    table_file: Option<String>,
    extra_table_file: Option<String>,
    crc_in_header: Option<i64>,
    code_tweaks: BTreeMap<String, String>,
    scalars: BTreeMap<String, i64>,
    arrays: BTreeMap<String, Vec<i64>>,
    static_records: Vec<StaticRecord>,
    text_patches: Vec<TextPatchDescriptor>,
}

impl EntryBuilder {
    pub(crate) fn new(name: &str, dialect: SchemaDialect) -> Self {
        EntryBuilder {
            name: name.to_string(),
            dialect,
            parents: Vec::new(),
            rom_code: None,
            version: None,
            non_japanese: None,
            rom_type: None,
            table_file: None,
            extra_table_file: None,
            crc_in_header: None,
            code_tweaks: BTreeMap::new(),
            scalars: BTreeMap::new(),
            arrays: BTreeMap::new(),
            static_records: Vec::new(),
            text_patches: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Record one `key=value` line.
    pub(crate) fn apply(&mut self, line: usize, key: &str, value: &str) {
        match key {
            "Game" => self.rom_code = Some(value.to_string()),
            "Version" => self.version = Some(int_or_zero(line, value)),
            "NonJapanese" => self.non_japanese = Some(int_or_zero(line, value)),
            "Type" => self.rom_type = Some(value.to_string()),
            "TableFile" => self.table_file = Some(value.to_string()),
            "ExtraTableFile" => self.extra_table_file = Some(value.to_string()),
            "CRCInHeader" => self.crc_in_header = Some(int_or_zero(line, value)),
            "CopyFrom" => self.parents.push(value.to_string()),
            TEXT_PATCH_KEY | TUTOR_TEXT_PATCH_KEY => self.apply_text_patch(line, key, value),
            k if PAIRED_STATIC_KEYS.contains(&k) => self.apply_static_pair(line, key, value),
            k if k.ends_with("Tweak") => {
                self.code_tweaks.insert(key.to_string(), value.to_string());
            }
            k if is_static_key(k) => self.apply_static(line, key, value),
            _ => match list_body(value) {
                Some(body) => {
                    self.arrays.insert(key.to_string(), parse_list(line, body));
                }
                None => {
                    self.scalars.insert(key.to_string(), int_or_zero(line, value));
                }
            },
        }
    }

    fn apply_static_pair(&mut self, line: usize, key: &str, value: &str) {
        let offsets = list_body(value)
            .map(|body| parse_list(line, body))
            .unwrap_or_default();
        if offsets.len() != 2 {
            warn!(
                "{}",
                SchemaLineError::PairArity {
                    line,
                    key: key.to_string(),
                    got: offsets.len(),
                }
            );
            return;
        }
        self.static_records.push(StaticRecord {
            key: key.to_string(),
            offsets,
        });
    }

    fn apply_static(&mut self, line: usize, key: &str, value: &str) {
        let Some(body) = list_body(value) else {
            self.static_records.push(StaticRecord {
                key: key.to_string(),
                offsets: vec![int_or_zero(line, value)],
            });
            return;
        };

        let offsets = parse_list(line, body);
        if offsets.is_empty() {
            return;
        }
        match self.dialect.static_records {
            StaticRecordMode::PerValue => {
                self.static_records
                    .extend(offsets.into_iter().map(|offset| StaticRecord {
                        key: key.to_string(),
                        offsets: vec![offset],
                    }))
            }
            StaticRecordMode::Grouped => self.static_records.push(StaticRecord {
                key: key.to_string(),
                offsets,
            }),
        }
    }

    fn apply_text_patch(&mut self, line: usize, key: &str, value: &str) {
        let Some(body) = list_body(value) else {
            warn!(
                "{}",
                SchemaLineError::NotAList {
                    line,
                    key: key.to_string(),
                }
            );
            return;
        };

        let arity = self.dialect.text_patch_arity.max(2);
        let parts: Vec<&str> = body.splitn(arity, ',').collect();
        if parts.len() != arity {
            warn!(
                "{}",
                SchemaLineError::TextPatchArity {
                    line,
                    key: key.to_string(),
                    expected: arity,
                    got: parts.len(),
                }
            );
            return;
        }

        self.text_patches.push(TextPatchDescriptor {
            number: int_or_zero(line, parts[0]),
            locator: parts[1..arity - 1]
                .iter()
                .map(|part| int_or_zero(line, part))
                .collect(),
            template: TextTemplate::new(parts[arity - 1]),
            is_move_tutor: key == TUTOR_TEXT_PATCH_KEY,
        });
    }

    /// Resolve `CopyFrom` against the entries declared so far and produce
    /// the finished entry.
    ///
    /// Only entries in `resolved` can be copied from. A parent that is not
    /// there, including a later section or this one, is logged and
    /// contributes nothing.
    pub(crate) fn freeze(self, resolved: &[SchemaEntry]) -> SchemaEntry {
        let copy_static = self.scalars.get(COPY_STATIC).map_or(false, |v| *v > 0);
        let copy_text = self.scalars.get(COPY_TEXT).map_or(false, |v| *v > 0);
        let sets_static_support = self.scalars.contains_key(STATIC_SUPPORT);

        let mut entry = SchemaEntry {
            name: self.name,
            rom_code: self.rom_code,
            version: self.version.unwrap_or(0),
            non_japanese: self.non_japanese.unwrap_or(0),
            rom_type: self.rom_type,
            table_file: self.table_file,
            extra_table_file: self.extra_table_file,
            crc_in_header: self.crc_in_header.unwrap_or(-1),
            code_tweaks: self.code_tweaks,
            scalars: self.scalars,
            arrays: self.arrays,
            static_records: Vec::new(),
            text_patches: Vec::new(),
        };

        let mut inherited_static = Vec::new();
        let mut inherited_text = Vec::new();

        for parent_name in &self.parents {
            let Some(parent) = resolved
                .iter()
                .find(|e| e.name.eq_ignore_ascii_case(parent_name))
            else {
                warn!(
                    "[{}] CopyFrom={}: no earlier entry with that name",
                    entry.name, parent_name
                );
                continue;
            };

            debug!("[{}] inherits from [{}]", entry.name, parent.name);
            for (key, value) in &parent.scalars {
                entry.scalars.entry(key.clone()).or_insert(*value);
            }
            for (key, values) in &parent.arrays {
                entry.arrays.entry(key.clone()).or_insert_with(|| values.clone());
            }
            if copy_static {
                inherited_static.extend(parent.static_records.iter().cloned());
            }
            if copy_text {
                inherited_text.extend(parent.text_patches.iter().cloned());
            }
            if !sets_static_support {
                entry
                    .scalars
                    .insert(STATIC_SUPPORT.to_string(), i64::from(copy_static));
            }
            if entry.table_file.is_none() {
                entry.table_file = parent.table_file.clone();
            }
            if entry.extra_table_file.is_none() {
                entry.extra_table_file = parent.extra_table_file.clone();
            }
        }

        inherited_static.extend(self.static_records);
        inherited_text.extend(self.text_patches);
        entry.static_records = inherited_static;
        entry.text_patches = inherited_text;
        entry
    }
}
