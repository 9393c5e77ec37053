//! Entities that have a dedicated representation on the wire.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::{CodecError, Result};
use crate::value::Value;

/// A named collection or namespace, `{"@mod": "<name>"}` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Module {
    name: String,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Module {
    fn from(name: &str) -> Self {
        Module::new(name)
    }
}

/// Binary payload, `{"@bytes": "<base64>"}` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl From<Vec<u8>> for Bytes {
    fn from(data: Vec<u8>) -> Self {
        Bytes(data)
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A document identified by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub id: String,
    pub coll: Module,
    pub ts: Option<DateTime<Utc>>,
    pub data: IndexMap<String, Value>,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

/// A document identified by name, such as a collection or function definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedDocument {
    pub name: String,
    pub coll: Module,
    pub ts: Option<DateTime<Utc>>,
    pub data: IndexMap<String, Value>,
}

impl NamedDocument {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub id: String,
    pub coll: Module,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NamedDocumentRef {
    pub name: String,
    pub coll: Module,
}

/// How a reference identifies its target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    Id(String),
    Name(String),
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKey::Id(id) => f.write_str(id),
            DocumentKey::Name(name) => f.write_str(name),
        }
    }
}

/// A reference whose target is known not to exist.
///
/// Decoding one always succeeds; the failure is deferred to the first
/// attempt to reach the document's payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NullDocument {
    pub key: DocumentKey,
    pub coll: Module,
    pub cause: String,
}

impl NullDocument {
    pub fn error(&self) -> CodecError {
        CodecError::UnresolvedDocument {
            id: self.key.to_string(),
            coll: self.coll.name().to_string(),
            cause: self.cause.clone(),
        }
    }
}

/// Either a decoded document or the reason it is missing.
#[derive(Debug, Clone, PartialEq)]
pub enum NullableDocument<T> {
    Present(T),
    Null(NullDocument),
}

impl<T> NullableDocument<T> {
    /// The document, or [`CodecError::UnresolvedDocument`] when it is missing.
    pub fn get(&self) -> Result<&T> {
        match self {
            NullableDocument::Present(doc) => Ok(doc),
            NullableDocument::Null(null) => Err(null.error()),
        }
    }

    pub fn into_inner(self) -> Result<T> {
        match self {
            NullableDocument::Present(doc) => Ok(doc),
            NullableDocument::Null(null) => Err(null.error()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, NullableDocument::Null(_))
    }
}

/// One page of a larger result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Opaque cursor for the next page; `None` on the last page.
    pub after: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            after: None,
        }
    }
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.after.is_some()
    }
}
