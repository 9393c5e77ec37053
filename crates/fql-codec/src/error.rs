//! Error type shared by the parser, the generator and every codec.

use thiserror::Error;

use crate::token::Token;

pub type Result<T, E = CodecError> = std::result::Result<T, E>;

/// Everything that can go wrong while moving values across the wire.
///
/// None of these are retried: malformed data is deterministic, and schema
/// problems surface the first time a type is resolved.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Truncated or structurally invalid JSON, or a tagged payload that does
    /// not parse (e.g. an `@int` outside the 32-bit range).
    #[error("malformed stream at byte {offset}: {message}")]
    MalformedStream { offset: usize, message: String },

    /// The current token is not what the accessor or codec asked for.
    #[error("type mismatch{}: expected {expected}, found {actual}", field_suffix(.field))]
    TypeMismatch {
        expected: &'static str,
        actual: Token,
        field: Option<String>,
    },

    /// The registry has no rule to build a codec for this type.
    #[error("unsupported type {type_name}: {reason}")]
    UnsupportedType {
        type_name: &'static str,
        reason: String,
    },

    /// Two fields of one record declare the same wire name.
    #[error("schema conflict in {type_name}: duplicate field `{field}`")]
    SchemaConflict {
        type_name: &'static str,
        field: String,
    },

    /// The payload of a reference to a missing document was accessed.
    #[error("document {id} in {coll} is not available: {cause}")]
    UnresolvedDocument {
        id: String,
        coll: String,
        cause: String,
    },

    /// Read or write attempted after the top-level value was complete.
    #[error("stream exhausted")]
    StreamExhausted,
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(name) => format!(" in field `{name}`"),
        None => String::new(),
    }
}

impl CodecError {
    pub fn malformed(offset: usize, message: impl Into<String>) -> Self {
        CodecError::MalformedStream {
            offset,
            message: message.into(),
        }
    }

    pub fn mismatch(expected: &'static str, actual: Token) -> Self {
        CodecError::TypeMismatch {
            expected,
            actual,
            field: None,
        }
    }

    pub fn unsupported(type_name: &'static str, reason: impl Into<String>) -> Self {
        CodecError::UnsupportedType {
            type_name,
            reason: reason.into(),
        }
    }

    /// Attach a field name to a [`CodecError::TypeMismatch`] that has none yet.
    pub fn in_field(self, name: &str) -> Self {
        match self {
            CodecError::TypeMismatch {
                expected,
                actual,
                field: None,
            } => CodecError::TypeMismatch {
                expected,
                actual,
                field: Some(name.to_string()),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_names_the_field() {
        let err = CodecError::mismatch("@int", Token::String).in_field("age");
        assert_eq!(
            err.to_string(),
            "type mismatch in field `age`: expected @int, found string"
        );
    }

    #[test]
    fn in_field_keeps_the_innermost_name() {
        let err = CodecError::mismatch("@int", Token::Bool)
            .in_field("inner")
            .in_field("outer");
        match err {
            CodecError::TypeMismatch { field, .. } => assert_eq!(field.as_deref(), Some("inner")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn in_field_leaves_other_kinds_alone() {
        let err = CodecError::malformed(3, "bad").in_field("x");
        assert_eq!(err, CodecError::malformed(3, "bad"));
    }
}
