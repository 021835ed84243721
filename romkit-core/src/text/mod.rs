//! In-game text: character tables, encoding and templated replacement text.

mod codec;
mod table;
mod template;

pub use codec::{
    Decoded, Encoded, FieldKind, Padding, TextCodec, TextConventions, UnmatchedPolicy,
};
pub use table::CharacterTable;
pub use template::{rewrap, LineBreaks, TextTemplate, MOVE_PLACEHOLDERS};
