//! Tuning knobs for parsing and record decoding.

/// Options controlling [`TaggedParser`](crate::TaggedParser) behaviour.
#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Maximum number of nested containers before the input is rejected
    /// as malformed.
    pub max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { max_depth: 512 }
    }
}

/// What to do when one object carries the same field twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateFields {
    /// The later occurrence overwrites the earlier one.
    #[default]
    LastWins,
    /// A repeated field is a malformed stream.
    Reject,
}

/// Options applied by record codecs built from a registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// When `true`, a non-nullable record field absent from the wire is a
    /// malformed stream. Otherwise it keeps its `Default` value.
    pub require_fields: bool,
    pub duplicate_fields: DuplicateFields,
}
