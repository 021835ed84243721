//! Locating config resources: schema files, character tables and code-tweak
//! patches, looked up across an ordered list of directories.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use flate2::Crc;
use log::{debug, warn};
use walkdir::WalkDir;

use crate::schema::SchemaEntry;
use crate::text::CharacterTable;
use crate::{Result, RomError};

/// Overlay table name meaning "no overlay".
const NO_TABLE: &str = "none";

fn join_candidate(base: &Path, candidate: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in candidate.split(['/', '\\']) {
        if !part.is_empty() {
            path.push(part);
        }
    }
    path
}

/// CRC-32 of the trimmed, non-empty lines of `text`, used to fingerprint a
/// config file independent of line endings and blank lines.
pub fn config_checksum(text: &str) -> u32 {
    let mut crc = Crc::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        crc.update(line.as_bytes());
    }
    crc.sum()
}

/// Config search path. Earlier roots shadow later ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDir {
    roots: Vec<PathBuf>,
}

impl ConfigDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ConfigDir {
            roots: vec![root.into()],
        }
    }

    /// Put `root` in front of the existing roots.
    pub fn with_override(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(0, root.into());
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// First existing `relative` path across the roots.
    pub fn find(&self, relative: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .map(|root| join_candidate(root, relative))
            .find(|path| path.is_file())
    }

    fn require(&self, relative: &str) -> Result<PathBuf> {
        self.find(relative).ok_or_else(|| {
            RomError::Config(format!(
                "{} not found in any of {} config root(s)",
                relative,
                self.roots.len()
            ))
        })
    }

    pub fn read_to_string(&self, relative: &str) -> Result<String> {
        let path = self.require(relative)?;
        debug!("reading {}", path.display());
        Ok(fs::read_to_string(path)?)
    }

    pub fn read_bytes(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.require(relative)?;
        debug!("reading {}", path.display());
        Ok(fs::read(path)?)
    }

    /// Text of `<name>.ini`.
    pub fn schema_text(&self, name: &str) -> Result<String> {
        self.read_to_string(&format!("{}.ini", name))
    }

    /// Parse `<name>.tbl`.
    pub fn load_table(&self, name: &str) -> Result<CharacterTable> {
        let text = self.read_to_string(&format!("{}.tbl", name))?;
        Ok(CharacterTable::parse(&text))
    }

    /// Base table plus the entry's overlay table.
    ///
    /// The base is `base` when given, else the entry's `TableFile`. The
    /// overlay is the entry's `ExtraTableFile` unless that is `none`. Missing
    /// table files are logged and skipped; only an entry naming no base
    /// table at all is an error.
    pub fn tables_for(&self, entry: &SchemaEntry, base: Option<&str>) -> Result<CharacterTable> {
        let base_name = base.or_else(|| entry.table_file()).ok_or_else(|| {
            RomError::Config(format!("[{}] has no TableFile", entry.name()))
        })?;
        let mut table = match self.load_table(base_name) {
            Ok(table) => table,
            Err(RomError::Config(msg)) => {
                warn!("[{}] base table skipped: {}", entry.name(), msg);
                CharacterTable::new()
            }
            Err(err) => return Err(err),
        };

        if let Some(extra) = entry.extra_table_file() {
            if !extra.eq_ignore_ascii_case(NO_TABLE) {
                match self.read_to_string(&format!("{}.tbl", extra)) {
                    Ok(text) => {
                        let applied = table.extend_from_str(&text);
                        debug!("overlay table {} applied {} mapping(s)", extra, applied);
                    }
                    Err(err) => warn!("[{}] overlay table skipped: {}", entry.name(), err),
                }
            }
        }
        Ok(table)
    }

    /// Bytes of the code-tweak patch `patches/<name>.ips`.
    pub fn patch_bytes(&self, name: &str) -> Result<Vec<u8>> {
        self.read_bytes(&format!("patches/{}.ips", name))
    }

    /// Stems of every file with `extension` under any root, each listed once.
    pub fn list(&self, extension: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        for root in &self.roots {
            for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                let path = entry.path();
                if !entry.file_type().is_file()
                    || path.extension().and_then(|e| e.to_str()) != Some(extension)
                {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    seen.insert(stem.to_string());
                }
            }
        }
        seen.into_iter().collect()
    }

    /// [`config_checksum`] of a resource.
    pub fn checksum(&self, relative: &str) -> Result<u32> {
        Ok(config_checksum(&self.read_to_string(relative)?))
    }
}
