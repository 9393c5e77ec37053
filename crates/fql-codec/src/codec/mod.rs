//! Per-type encode/decode logic and the rules that build it.
//!
//! A [`Codec<T>`] moves one host type across the wire. Host types opt in
//! by implementing [`WireType`], which tells the
//! [`CodecRegistry`](crate::CodecRegistry) how to assemble their codec from
//! the codecs of their parts. Records (host structs) implement
//! [`Record`](record::Record) and get their `WireType` from
//! [`wire_record!`](crate::wire_record).

pub mod container;
pub mod document;
pub mod dynamic;
pub mod primitive;
pub mod record;
pub mod registry;

use std::fmt;
use std::sync::Arc;

use crate::error::{CodecError, Result};
use crate::generator::TaggedGenerator;
use crate::parser::TaggedParser;
use crate::token::Token;

pub use document::RefInfo;

/// Paired encode/decode logic for `T`.
///
/// `decode` is called with the parser positioned on the first token of the
/// value and must leave it on the value's last token.
pub trait Codec<T>: Send + Sync {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<T>;
    fn encode(&self, gen: &mut TaggedGenerator, value: &T) -> Result<()>;
}

pub type CodecRef<T> = Arc<dyn Codec<T>>;

/// Explicit wire type requested for a field, overriding the host type's
/// natural encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// `@int` when the value fits in 32 bits, `@long` otherwise.
    Int,
    Long,
    Double,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldType::Int => "@int",
            FieldType::Long => "@long",
            FieldType::Double => "@double",
        })
    }
}

/// A host type the registry knows how to build a codec for.
pub trait WireType: Sized + Send + Sync + 'static {
    /// Whether wire `null` is a legitimate value of this type.
    const NULLABLE: bool = false;

    /// Builds the natural codec, resolving inner codecs through `registry`.
    fn build_codec(registry: &registry::CodecRegistry) -> Result<CodecRef<Self>>;

    /// Builds a codec that honours an explicit wire type.
    fn build_hinted(
        _registry: &registry::CodecRegistry,
        hint: FieldType,
    ) -> Result<CodecRef<Self>> {
        Err(CodecError::unsupported(
            std::any::type_name::<Self>(),
            format!("cannot be encoded as {hint}"),
        ))
    }

    /// Converts a reference to an existing document into this type.
    fn from_ref(_info: RefInfo) -> Result<Self> {
        Err(CodecError::mismatch("@doc", Token::StartRef))
    }
}

/// Implements [`WireType`] for types that implement [`Record`](record::Record).
///
/// ```
/// use fql_codec::{wire_record, CodecRegistry, FieldSet, Record};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// impl Record for Point {
///     fn describe(fields: &mut FieldSet<Self>) {
///         fields.field("x", |p| &p.x, |p| &mut p.x);
///         fields.field("y", |p| &p.y, |p| &mut p.y);
///     }
/// }
///
/// wire_record!(Point);
///
/// let registry = CodecRegistry::new();
/// let text = registry.encode(&Point { x: 1, y: 2 }).unwrap();
/// assert_eq!(text, r#"{"x":{"@int":"1"},"y":{"@int":"2"}}"#);
/// assert_eq!(registry.decode_str::<Point>(&text).unwrap(), Point { x: 1, y: 2 });
/// ```
#[macro_export]
macro_rules! wire_record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::WireType for $ty {
                fn build_codec(
                    registry: &$crate::CodecRegistry,
                ) -> $crate::Result<$crate::CodecRef<Self>> {
                    $crate::codec::record::RecordCodec::<Self>::build(registry)
                }
            }
        )+
    };
}
