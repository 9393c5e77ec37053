//! Dynamic values: what the wire decodes to when no host type is requested.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;

use crate::error::{CodecError, Result};
use crate::token::Token;
use crate::types::{
    Bytes, Document, DocumentRef, Module, NamedDocument, NamedDocumentRef, NullDocument, Page,
};

/// A decoded value whose shape was chosen by the wire tags alone.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Bytes),
    Date(NaiveDate),
    Time(DateTime<Utc>),
    Module(Module),
    Array(Vec<Value>),
    /// Keys in wire order.
    Object(IndexMap<String, Value>),
    Document(Document),
    NamedDocument(NamedDocument),
    Ref(DocumentRef),
    NamedRef(NamedDocumentRef),
    NullDocument(NullDocument),
    Page(Page<Value>),
}

impl Value {
    /// Name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Module(_) => "module",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Document(_) => "document",
            Value::NamedDocument(_) => "named document",
            Value::Ref(_) => "ref",
            Value::NamedRef(_) => "named ref",
            Value::NullDocument(_) => "null document",
            Value::Page(_) => "page",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v as i64),
            Value::Long(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Int(v) => Some(v as f64),
            Value::Long(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// The document behind this value. A reference to a missing document
    /// fails with [`CodecError::UnresolvedDocument`].
    pub fn as_document(&self) -> Result<&Document> {
        match self {
            Value::Document(doc) => Ok(doc),
            Value::NullDocument(null) => Err(null.error()),
            _ => Err(CodecError::mismatch("@doc", self.token())),
        }
    }

    /// Field lookup on objects and documents.
    pub fn get(&self, field: &str) -> Result<Option<&Value>> {
        match self {
            Value::Object(map) => Ok(map.get(field)),
            Value::Document(doc) => Ok(doc.get(field)),
            Value::NamedDocument(doc) => Ok(doc.get(field)),
            Value::NullDocument(null) => Err(null.error()),
            _ => Err(CodecError::mismatch("object", self.token())),
        }
    }

    /// First wire token this value encodes to.
    pub fn token(&self) -> Token {
        match self {
            Value::Null => Token::Null,
            Value::Bool(_) => Token::Bool,
            Value::Int(_) => Token::Int,
            Value::Long(_) => Token::Long,
            Value::Double(_) => Token::Double,
            Value::String(_) => Token::String,
            Value::Bytes(_) => Token::Bytes,
            Value::Date(_) => Token::Date,
            Value::Time(_) => Token::Time,
            Value::Module(_) => Token::Module,
            Value::Array(_) => Token::StartArray,
            Value::Object(_) => Token::StartObject,
            Value::Document(_)
            | Value::NamedDocument(_)
            | Value::Ref(_)
            | Value::NamedRef(_)
            | Value::NullDocument(_) => Token::StartRef,
            Value::Page(_) => Token::StartSet,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Module> for Value {
    fn from(v: Module) -> Self {
        Value::Module(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

/// Plain JSON maps onto the untagged subset: numbers take the narrowest
/// width that holds them.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => match i32::try_from(i) {
                    Ok(v) => Value::Int(v),
                    Err(_) => Value::Long(i),
                },
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}
