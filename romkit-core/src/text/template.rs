//! Replacement text built from config templates.

use serde::{Deserialize, Serialize};

/// Placeholders that stand for a move name in text-patch templates.
pub const MOVE_PLACEHOLDERS: [&str; 2] = ["[move]", "%m"];

/// Stands in for the spaces of a substituted name while wrapping, so the
/// name is never split across lines.
const GLUE: char = '\u{00A0}';

/// Template text with `[name]` or `%x` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextTemplate {
    raw: String,
}

impl TextTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        TextTemplate { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Every distinct `[name]` and `%x` placeholder, in order of appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut found: Vec<&str> = Vec::new();
        let bytes = self.raw.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let candidate = match bytes[i] {
                b'[' => self.raw[i + 1..].find(']').and_then(|close| {
                    let name = &self.raw[i + 1..i + 1 + close];
                    (!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
                        .then(|| &self.raw[i..i + close + 2])
                }),
                b'%' if bytes.get(i + 1).map_or(false, |b| b.is_ascii_alphabetic()) => {
                    Some(&self.raw[i..i + 2])
                }
                _ => None,
            };
            match candidate {
                Some(placeholder) => {
                    if !found.contains(&placeholder) {
                        found.push(placeholder);
                    }
                    i += placeholder.len();
                }
                None => i += 1,
            }
        }
        found
    }

    /// Substitute each `(placeholder, value)` pair. Placeholders without a
    /// value are left as they are.
    pub fn render(&self, values: &[(&str, &str)]) -> String {
        values
            .iter()
            .fold(self.raw.clone(), |text, (placeholder, value)| {
                text.replace(placeholder, value)
            })
    }

    pub fn render_move(&self, move_name: &str) -> String {
        let values: Vec<(&str, &str)> = MOVE_PLACEHOLDERS
            .iter()
            .map(|placeholder| (*placeholder, move_name))
            .collect();
        self.render(&values)
    }

    /// Render with `move_name` and wrap the result with [`rewrap`]. The move
    /// name stays on one line even when it contains spaces.
    pub fn render_move_wrapped<M>(
        &self,
        move_name: &str,
        breaks: LineBreaks<'_>,
        limit: usize,
        measure: M,
    ) -> String
    where
        M: Fn(&str) -> usize,
    {
        let glued = move_name.replace(' ', &GLUE.to_string());
        let rendered = self.render_move(&glued);
        rewrap(&rendered, breaks, limit, |word| {
            if word.contains(GLUE) {
                measure(&word.replace(GLUE, " "))
            } else {
                measure(word)
            }
        })
        .replace(GLUE, " ")
    }
}

impl From<&str> for TextTemplate {
    fn from(raw: &str) -> Self {
        TextTemplate::new(raw)
    }
}

/// Break tokens used when wrapping text for a two-line text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineBreaks<'a> {
    /// Between the first and second line of a box.
    pub newline: &'a str,
    /// Every later break, scrolling the box up one line.
    pub scroll: &'a str,
}

impl LineBreaks<'static> {
    pub const GAME_BOY_ADVANCE: LineBreaks<'static> = LineBreaks {
        newline: "\\n",
        scroll: "\\l",
    };
}

/// Greedy word wrap of `text` into lines of at most `limit` units.
///
/// Break tokens already in `text` are treated as spaces. `measure` gives the
/// width of a word, usually its encoded length. A word wider than `limit` is
/// placed on a line of its own.
pub fn rewrap<M>(text: &str, breaks: LineBreaks<'_>, limit: usize, measure: M) -> String
where
    M: Fn(&str) -> usize,
{
    let flattened = [breaks.newline, breaks.scroll]
        .iter()
        .filter(|token| !token.is_empty())
        .fold(text.to_string(), |acc, token| acc.replace(token, " "));

    let space = measure(" ");
    let mut out = String::with_capacity(flattened.len() + 8);
    let mut line_width = 0usize;
    let mut lines = 0usize;

    for word in flattened.split(' ').filter(|w| !w.is_empty()) {
        let width = measure(word);
        if line_width == 0 && lines == 0 {
            out.push_str(word);
            line_width = width;
            lines = 1;
        } else if line_width + space + width <= limit {
            out.push(' ');
            out.push_str(word);
            line_width += space + width;
        } else {
            out.push_str(if lines == 1 { breaks.newline } else { breaks.scroll });
            out.push_str(word);
            line_width = width;
            lines += 1;
        }
    }
    out
}
