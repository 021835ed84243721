//! Per-revision offset profiles loaded from `[Name]` / `Key=Value` config text.
//!
//! A section may name an earlier section with `CopyFrom=` to start from its
//! values. Scalars and lists are inherited unless the section sets them
//! itself. Static records and text patches are inherited only when the
//! section opts in with `CopyStaticPokemon=1` or `CopyTMText=1`.

mod builder;
mod entry;
mod parse;
mod registry;

pub use builder::{SchemaDialect, StaticRecordMode};
pub use entry::{SchemaEntry, StaticRecord, TextPatchDescriptor};
pub use parse::{parse_int, SchemaLineError};
pub use registry::{HeaderLayout, SchemaRegistry};
