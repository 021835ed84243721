use log::warn;
use thiserror::Error;

/// Problems with a single config line. They are logged and the line (or the
/// bad value) is skipped, never returned to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaLineError {
    #[error("line {line}: expected Key=Value, got '{text}'")]
    MissingEquals { line: usize, text: String },

    #[error("line {line}: '{key}' appears before any [section]")]
    OutsideSection { line: usize, key: String },

    #[error("line {line}: invalid integer '{token}', using 0")]
    BadInteger { line: usize, token: String },

    #[error("line {line}: {key} needs exactly 2 offsets, got {got}")]
    PairArity { line: usize, key: String, got: usize },

    #[error("line {line}: {key} needs {expected} fields, got {got}")]
    TextPatchArity {
        line: usize,
        key: String,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: {key} value must be a bracketed list")]
    NotAList { line: usize, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Section(&'a str),
    Pair { key: &'a str, value: &'a str },
    Invalid(&'a str),
}

/// Classify one raw line. Comments start at `//`; blank lines yield `None`.
pub(crate) fn parse_line(raw: &str) -> Option<Line<'_>> {
    let mut text = raw.trim();
    if let Some(idx) = text.find("//") {
        text = text[..idx].trim();
    }
    if text.is_empty() {
        return None;
    }

    if let Some(name) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        return Some(Line::Section(name));
    }

    match text.split_once('=') {
        Some((key, value)) => Some(Line::Pair {
            key: key.trim(),
            value: value.trim(),
        }),
        None => Some(Line::Invalid(text)),
    }
}

/// Decimal, or hexadecimal with a `0x` / `&h` prefix (any case).
pub fn parse_int(token: &str) -> Option<i64> {
    let t = token.trim().to_ascii_lowercase();
    let (digits, radix) = match t.strip_prefix("0x").or_else(|| t.strip_prefix("&h")) {
        Some(hex) => (hex, 16),
        None => (t.as_str(), 10),
    };
    i64::from_str_radix(digits, radix).ok()
}

/// [`parse_int`], logging and substituting 0 on failure.
pub(crate) fn int_or_zero(line: usize, token: &str) -> i64 {
    parse_int(token).unwrap_or_else(|| {
        warn!(
            "{}",
            SchemaLineError::BadInteger {
                line,
                token: token.trim().to_string(),
            }
        );
        0
    })
}

/// Inner text of a `[...]` value.
pub(crate) fn list_body(value: &str) -> Option<&str> {
    value.strip_prefix('[').and_then(|v| v.strip_suffix(']'))
}

/// Comma separated integers. `[]` and `[ ]` are empty lists.
pub(crate) fn parse_list(line: usize, body: &str) -> Vec<i64> {
    if body.trim().is_empty() {
        return Vec::new();
    }
    body.split(',').map(|item| int_or_zero(line, item)).collect()
}
