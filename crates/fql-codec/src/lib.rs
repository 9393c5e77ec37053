//! Tagged-value wire codec for FQL.
//!
//! Values travel as JSON in which every type JSON cannot express natively
//! is wrapped in a single-key object whose key is a reserved tag:
//!
//! ```text
//! {"@int":"42"}  {"@long":"9007199254740993"}  {"@double":"NaN"}
//! {"@date":"2023-02-28"}  {"@time":"2023-02-28T10:10:10.000001Z"}
//! {"@mod":"Users"}  {"@bytes":"AQID"}
//! {"@doc":{...}}  {"@ref":{...}}  {"@set":{...}}  {"@object":{...}}
//! ```
//!
//! [`TaggedParser`] turns the text into a stream of [`Token`]s with the tags
//! already resolved, [`TaggedGenerator`] writes the same stream back out,
//! and a [`CodecRegistry`] maps host types onto that stream.
//!
//! ```
//! use fql_codec::{CodecRegistry, Value};
//!
//! let registry = CodecRegistry::new();
//! let value: Value = registry.decode_str(r#"{"n":{"@long":"5"}}"#).unwrap();
//! assert_eq!(value.get("n").unwrap(), Some(&Value::Long(5)));
//! assert_eq!(registry.encode(&value).unwrap(), r#"{"n":{"@long":"5"}}"#);
//! ```

pub mod codec;
pub mod error;
pub mod generator;
pub mod options;
pub mod parser;
pub mod token;
pub mod types;
pub mod value;
pub mod writer;

pub use codec::record::{FieldInfo, FieldSet, FieldSpec, MappingInfo, Record};
pub use codec::registry::CodecRegistry;
pub use codec::{Codec, CodecRef, FieldType, RefInfo, WireType};
pub use error::{CodecError, Result};
pub use generator::TaggedGenerator;
pub use options::{DecodeOptions, DuplicateFields, ParserOptions};
pub use parser::{ParseState, TaggedParser};
pub use token::{Container, Tag, Token};
pub use types::{
    Bytes, Document, DocumentKey, DocumentRef, Module, NamedDocument, NamedDocumentRef,
    NullDocument, NullableDocument, Page,
};
pub use value::Value;
pub use writer::Writer;
