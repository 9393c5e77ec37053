//! Documents, references, and references to documents that do not exist.
//!
//! Host documents always encode as references: the server resolves
//! `{"@ref": {...}}` arguments, and sending the payload back is never
//! needed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::codec::container::read_fields;
use crate::codec::dynamic::decode_value;
use crate::codec::registry::CodecRegistry;
use crate::codec::{Codec, CodecRef, WireType};
use crate::error::{CodecError, Result};
use crate::generator::TaggedGenerator;
use crate::parser::TaggedParser;
use crate::token::Token;
use crate::types::{
    Document, DocumentKey, DocumentRef, Module, NamedDocument, NamedDocumentRef, NullDocument,
    NullableDocument,
};
use crate::value::Value;

const DEFAULT_CAUSE: &str = "not found";

/// The fields of an `@ref` region.
#[derive(Debug, Clone, PartialEq)]
pub struct RefInfo {
    pub key: DocumentKey,
    pub coll: Module,
    /// `Some(false)` when the server reports the target as missing.
    pub exists: Option<bool>,
    pub cause: Option<String>,
}

impl RefInfo {
    /// Reads a reference region; the parser must sit on `StartRef` and is
    /// left on `EndRef`. Unknown fields are skipped.
    pub fn read(parser: &mut TaggedParser<'_>) -> Result<Self> {
        parser.expect(Token::StartRef)?;
        let mut id = None;
        let mut name = None;
        let mut coll = None;
        let mut exists = None;
        let mut cause = None;
        read_fields(parser, Token::EndRef, |p, field| {
            match field.as_str() {
                "id" => id = Some(p.as_str()?.to_owned()),
                "name" => name = Some(p.as_str()?.to_owned()),
                "coll" => coll = Some(p.as_module()?),
                "exists" => exists = Some(p.as_bool()?),
                "cause" => cause = Some(p.as_str()?.to_owned()),
                _ => p.skip()?,
            }
            Ok(())
        })?;
        let key = match (id, name) {
            (Some(id), _) => DocumentKey::Id(id),
            (None, Some(name)) => DocumentKey::Name(name),
            (None, None) => return Err(parser.malformed("reference has neither id nor name")),
        };
        let coll = coll.ok_or_else(|| parser.malformed("reference has no coll"))?;
        Ok(Self {
            key,
            coll,
            exists,
            cause,
        })
    }

    pub fn is_missing(&self) -> bool {
        self.exists == Some(false)
    }

    /// Splits off references to missing documents.
    pub fn into_missing(self) -> std::result::Result<NullDocument, RefInfo> {
        if self.is_missing() {
            Ok(NullDocument {
                key: self.key,
                coll: self.coll,
                cause: self.cause.unwrap_or_else(|| DEFAULT_CAUSE.to_string()),
            })
        } else {
            Err(self)
        }
    }

    /// Fails with [`CodecError::UnresolvedDocument`] when the target is missing.
    fn existing(self) -> Result<RefInfo> {
        self.into_missing().map_or_else(Ok, |null| Err(null.error()))
    }
}

pub(crate) fn write_ref(gen: &mut TaggedGenerator, key: &DocumentKey, coll: &Module) -> Result<()> {
    gen.write_start_ref()?;
    match key {
        DocumentKey::Id(id) => {
            gen.write_field_name("id")?;
            gen.write_string(id)?;
        }
        DocumentKey::Name(name) => {
            gen.write_field_name("name")?;
            gen.write_string(name)?;
        }
    }
    gen.write_field_name("coll")?;
    gen.write_module(coll.name())?;
    gen.write_end_ref()
}

/// A decoded `@doc` region, before deciding between id and name identity.
pub(crate) struct DocumentParts {
    id: Option<String>,
    coll: Option<Module>,
    ts: Option<DateTime<Utc>>,
    data: IndexMap<String, Value>,
}

impl DocumentParts {
    /// The parser must sit on `StartDocument` and is left on `EndDocument`.
    pub(crate) fn read(parser: &mut TaggedParser<'_>) -> Result<Self> {
        parser.expect(Token::StartDocument)?;
        let mut parts = DocumentParts {
            id: None,
            coll: None,
            ts: None,
            data: IndexMap::new(),
        };
        read_fields(parser, Token::EndDocument, |p, field| {
            match field.as_str() {
                "id" => parts.id = Some(p.as_str()?.to_owned()),
                "coll" => parts.coll = Some(p.as_module()?),
                "ts" => parts.ts = Some(p.as_instant()?),
                _ => {
                    let value = decode_value(p)?;
                    parts.data.insert(field, value);
                }
            }
            Ok(())
        })?;
        if parts.coll.is_none() {
            return Err(parser.malformed("document has no coll"));
        }
        Ok(parts)
    }

    /// A `name` field identifies the document only when there is no `id`;
    /// otherwise it is ordinary data.
    pub(crate) fn into_value(self, parser: &TaggedParser<'_>) -> Result<Value> {
        if self.id.is_some() {
            return self.into_document(parser).map(Value::Document);
        }
        self.into_named(parser).map(Value::NamedDocument)
    }

    pub(crate) fn into_document(self, parser: &TaggedParser<'_>) -> Result<Document> {
        let id = self
            .id
            .ok_or_else(|| parser.malformed("document has no id"))?;
        Ok(Document {
            id,
            coll: self.coll.unwrap_or_default(),
            ts: self.ts,
            data: self.data,
        })
    }

    pub(crate) fn into_named(mut self, parser: &TaggedParser<'_>) -> Result<NamedDocument> {
        let name = match self.data.shift_remove("name") {
            Some(Value::String(name)) => name,
            _ => return Err(parser.malformed("document has neither id nor name")),
        };
        Ok(NamedDocument {
            name,
            coll: self.coll.unwrap_or_default(),
            ts: self.ts,
            data: self.data,
        })
    }
}

pub struct DocumentCodec;

impl Codec<Document> for DocumentCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<Document> {
        match parser.current() {
            Some(Token::StartDocument) => DocumentParts::read(parser)?.into_document(parser),
            Some(Token::StartRef) => Document::from_ref(RefInfo::read(parser)?),
            _ => Err(parser.mismatch("@doc")),
        }
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &Document) -> Result<()> {
        write_ref(gen, &DocumentKey::Id(value.id.clone()), &value.coll)
    }
}

impl WireType for Document {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(DocumentCodec))
    }

    fn from_ref(info: RefInfo) -> Result<Self> {
        info.existing()?;
        Err(CodecError::mismatch("@doc", Token::StartRef))
    }
}

pub struct NamedDocumentCodec;

impl Codec<NamedDocument> for NamedDocumentCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<NamedDocument> {
        match parser.current() {
            Some(Token::StartDocument) => DocumentParts::read(parser)?.into_named(parser),
            Some(Token::StartRef) => NamedDocument::from_ref(RefInfo::read(parser)?),
            _ => Err(parser.mismatch("@doc")),
        }
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &NamedDocument) -> Result<()> {
        write_ref(gen, &DocumentKey::Name(value.name.clone()), &value.coll)
    }
}

impl WireType for NamedDocument {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(NamedDocumentCodec))
    }

    fn from_ref(info: RefInfo) -> Result<Self> {
        info.existing()?;
        Err(CodecError::mismatch("@doc", Token::StartRef))
    }
}

/// References decode from `@ref` and also from a materialized `@doc`,
/// keeping only its identity.
pub struct DocumentRefCodec;

impl Codec<DocumentRef> for DocumentRefCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<DocumentRef> {
        match parser.current() {
            Some(Token::StartRef) => DocumentRef::from_ref(RefInfo::read(parser)?),
            Some(Token::StartDocument) => {
                let doc = DocumentParts::read(parser)?.into_document(parser)?;
                Ok(DocumentRef {
                    id: doc.id,
                    coll: doc.coll,
                })
            }
            _ => Err(parser.mismatch("@ref")),
        }
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &DocumentRef) -> Result<()> {
        write_ref(gen, &DocumentKey::Id(value.id.clone()), &value.coll)
    }
}

impl WireType for DocumentRef {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(DocumentRefCodec))
    }

    fn from_ref(info: RefInfo) -> Result<Self> {
        let info = info.existing()?;
        match info.key {
            DocumentKey::Id(id) => Ok(DocumentRef {
                id,
                coll: info.coll,
            }),
            DocumentKey::Name(_) => Err(CodecError::mismatch("id reference", Token::StartRef)),
        }
    }
}

pub struct NamedDocumentRefCodec;

impl Codec<NamedDocumentRef> for NamedDocumentRefCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<NamedDocumentRef> {
        match parser.current() {
            Some(Token::StartRef) => NamedDocumentRef::from_ref(RefInfo::read(parser)?),
            Some(Token::StartDocument) => {
                let doc = DocumentParts::read(parser)?.into_named(parser)?;
                Ok(NamedDocumentRef {
                    name: doc.name,
                    coll: doc.coll,
                })
            }
            _ => Err(parser.mismatch("@ref")),
        }
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &NamedDocumentRef) -> Result<()> {
        write_ref(gen, &DocumentKey::Name(value.name.clone()), &value.coll)
    }
}

impl WireType for NamedDocumentRef {
    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(NamedDocumentRefCodec))
    }

    fn from_ref(info: RefInfo) -> Result<Self> {
        let info = info.existing()?;
        match info.key {
            DocumentKey::Name(name) => Ok(NamedDocumentRef {
                name,
                coll: info.coll,
            }),
            DocumentKey::Id(_) => Err(CodecError::mismatch("name reference", Token::StartRef)),
        }
    }
}

/// Decoding never fails because the target is missing; that is recorded
/// as [`NullableDocument::Null`] and reported on access.
pub struct NullableDocumentCodec<T> {
    inner: CodecRef<T>,
}

impl<T: WireType> Codec<NullableDocument<T>> for NullableDocumentCodec<T> {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<NullableDocument<T>> {
        if parser.current() == Some(Token::StartRef) {
            return NullableDocument::from_ref(RefInfo::read(parser)?);
        }
        self.inner.decode(parser).map(NullableDocument::Present)
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &NullableDocument<T>) -> Result<()> {
        match value {
            NullableDocument::Present(doc) => self.inner.encode(gen, doc),
            NullableDocument::Null(null) => write_ref(gen, &null.key, &null.coll),
        }
    }
}

impl<T: WireType> WireType for NullableDocument<T> {
    fn build_codec(registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(NullableDocumentCodec {
            inner: registry.get::<T>()?,
        }))
    }

    fn from_ref(info: RefInfo) -> Result<Self> {
        match info.into_missing() {
            Ok(null) => Ok(NullableDocument::Null(null)),
            Err(info) => T::from_ref(info).map(NullableDocument::Present),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING: &str =
        r#"{"@ref":{"id":"123","coll":{"@mod":"Users"},"exists":false,"cause":"not found"}}"#;

    const DOC: &str = r#"{"@doc":{"id":"1","coll":{"@mod":"Users"},"ts":{"@time":"2023-01-01T00:00:00Z"},"name":"Alice","age":{"@int":"30"}}}"#;

    fn registry() -> CodecRegistry {
        CodecRegistry::new()
    }

    #[test]
    fn document_keeps_name_as_data_when_id_present() {
        let doc: Document = registry().decode_str(DOC).unwrap();
        assert_eq!(doc.id, "1");
        assert_eq!(doc.coll, Module::new("Users"));
        assert!(doc.ts.is_some());
        assert_eq!(doc.get("name"), Some(&Value::String("Alice".into())));
        assert_eq!(doc.get("age"), Some(&Value::Int(30)));
    }

    #[test]
    fn named_document() {
        let doc: NamedDocument = registry()
            .decode_str(r#"{"@doc":{"name":"Users","coll":{"@mod":"Collection"},"history_days":{"@int":"0"}}}"#)
            .unwrap();
        assert_eq!(doc.name, "Users");
        assert_eq!(doc.coll, Module::new("Collection"));
        assert_eq!(doc.data.len(), 1);
    }

    #[test]
    fn document_encodes_as_ref() {
        let doc: Document = registry().decode_str(DOC).unwrap();
        assert_eq!(
            registry().encode(&doc).unwrap(),
            r#"{"@ref":{"id":"1","coll":{"@mod":"Users"}}}"#
        );
    }

    #[test]
    fn missing_document_into_plain_document_fails() {
        let err = registry().decode_str::<Document>(MISSING).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnresolvedDocument {
                id: "123".into(),
                coll: "Users".into(),
                cause: "not found".into(),
            }
        );
    }

    #[test]
    fn missing_document_into_nullable_defers() {
        let doc: NullableDocument<Document> = registry().decode_str(MISSING).unwrap();
        assert!(doc.is_null());
        assert!(matches!(
            doc.get(),
            Err(CodecError::UnresolvedDocument { .. })
        ));
    }

    #[test]
    fn nullable_present_document() {
        let doc: NullableDocument<Document> = registry().decode_str(DOC).unwrap();
        assert_eq!(doc.get().unwrap().id, "1");
    }

    #[test]
    fn nullable_ref_to_existing_document() {
        let r: NullableDocument<DocumentRef> = registry()
            .decode_str(r#"{"@ref":{"id":"5","coll":{"@mod":"Users"}}}"#)
            .unwrap();
        assert_eq!(
            r.into_inner().unwrap(),
            DocumentRef {
                id: "5".into(),
                coll: "Users".into()
            }
        );
    }

    #[test]
    fn ref_from_materialized_document() {
        let r: DocumentRef = registry().decode_str(DOC).unwrap();
        assert_eq!(r.id, "1");
    }

    #[test]
    fn named_ref_round_trip() {
        let r = NamedDocumentRef {
            name: "Users".into(),
            coll: "Collection".into(),
        };
        let text = registry().encode(&r).unwrap();
        assert_eq!(text, r#"{"@ref":{"name":"Users","coll":{"@mod":"Collection"}}}"#);
        assert_eq!(registry().decode_str::<NamedDocumentRef>(&text).unwrap(), r);
    }

    #[test]
    fn ref_without_coll_is_malformed() {
        assert!(matches!(
            registry().decode_str::<DocumentRef>(r#"{"@ref":{"id":"1"}}"#),
            Err(CodecError::MalformedStream { .. })
        ));
    }

    #[test]
    fn null_document_encodes_as_its_ref() {
        let doc: NullableDocument<Document> = registry().decode_str(MISSING).unwrap();
        assert_eq!(
            registry().encode(&doc).unwrap(),
            r#"{"@ref":{"id":"123","coll":{"@mod":"Users"}}}"#
        );
    }
}
