use std::collections::HashMap;

use log::warn;

/// Byte <-> token mapping loaded from `HH=token` table files.
///
/// A byte maps to at most one token and a token to at most one byte. Loading
/// an override table on top of a base table replaces entries one by one.
#[derive(Debug, Clone)]
pub struct CharacterTable {
    forward: Vec<Option<String>>,
    reverse: HashMap<String, u8>,
    longest_token: usize,
}

impl Default for CharacterTable {
    fn default() -> Self {
        CharacterTable {
            forward: vec![None; 256],
            reverse: HashMap::new(),
            longest_token: 0,
        }
    }
}

impl CharacterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut table = CharacterTable::new();
        table.extend_from_str(text);
        table
    }

    /// Layer the mappings in `text` over the current ones.
    ///
    /// Lines that are not `HH=token` are logged and skipped. Returns the
    /// number of mappings applied.
    pub fn extend_from_str(&mut self, text: &str) -> usize {
        let mut applied = 0;
        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            if raw_line.trim().is_empty() {
                continue;
            }

            let Some((code, token)) = raw_line.split_once('=') else {
                warn!("table line {}: missing '=' in {:?}", line_no, raw_line);
                continue;
            };

            let byte = match u8::from_str_radix(code.trim(), 16) {
                Ok(byte) => byte,
                Err(_) => {
                    warn!("table line {}: bad byte code {:?}", line_no, code);
                    continue;
                }
            };

            self.insert(byte, token);
            applied += 1;
        }
        applied
    }

    /// Map `byte` to `token`, evicting whatever either side mapped to before.
    /// Returns the token `byte` used to have.
    pub fn insert(&mut self, byte: u8, token: impl Into<String>) -> Option<String> {
        let token = token.into();

        let previous = self.forward[byte as usize].take();
        if let Some(old) = &previous {
            if self.reverse.get(old) == Some(&byte) {
                self.reverse.remove(old);
            }
        }

        if let Some(other) = self.reverse.insert(token.clone(), byte) {
            if other != byte {
                self.forward[other as usize] = None;
            }
        }

        self.forward[byte as usize] = Some(token);
        self.recompute_longest();
        previous
    }

    fn recompute_longest(&mut self) {
        self.longest_token = self
            .reverse
            .keys()
            .map(|token| token.chars().count())
            .max()
            .unwrap_or(0);
    }

    pub fn lookup(&self, byte: u8) -> Option<&str> {
        self.forward[byte as usize].as_deref()
    }

    pub fn reverse(&self, token: &str) -> Option<u8> {
        self.reverse.get(token).copied()
    }

    /// Length in characters of the longest token.
    pub fn longest_token(&self) -> usize {
        self.longest_token
    }

    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> + '_ {
        self.forward
            .iter()
            .enumerate()
            .filter_map(|(byte, token)| token.as_deref().map(|t| (byte as u8, t)))
    }
}
