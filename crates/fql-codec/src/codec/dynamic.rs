//! The codec for [`Value`]: the wire decides the shape.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::codec::container::{read_array, read_fields, read_page, write_page};
use crate::codec::document::{write_ref, DocumentParts};
use crate::codec::registry::CodecRegistry;
use crate::codec::{Codec, CodecRef, RefInfo, WireType};
use crate::error::Result;
use crate::generator::TaggedGenerator;
use crate::parser::TaggedParser;
use crate::token::{needs_escape, Token};
use crate::types::{Bytes, DocumentKey, DocumentRef, NamedDocumentRef};
use crate::value::Value;

/// Decodes whatever value the parser is positioned on.
pub fn decode_value(parser: &mut TaggedParser<'_>) -> Result<Value> {
    let Some(token) = parser.current() else {
        return Err(parser.mismatch("value"));
    };
    Ok(match token {
        Token::Null => Value::Null,
        Token::Bool => Value::Bool(parser.as_bool()?),
        Token::String => Value::String(parser.as_str()?.to_owned()),
        Token::Int => Value::Int(parser.as_i32()?),
        Token::Long => Value::Long(parser.as_i64()?),
        Token::Double => Value::Double(parser.as_f64()?),
        Token::Date => Value::Date(parser.as_date()?),
        Token::Time => Value::Time(parser.as_instant()?),
        Token::Module => Value::Module(parser.as_module()?),
        Token::Bytes => Value::Bytes(Bytes(parser.as_bytes()?.to_vec())),
        Token::StartArray => Value::Array(read_array(parser, decode_value)?),
        Token::StartObject => {
            let mut map = IndexMap::new();
            read_fields(parser, Token::EndObject, |p, name| {
                let value = decode_value(p)?;
                map.insert(name, value);
                Ok(())
            })?;
            Value::Object(map)
        }
        Token::StartDocument => DocumentParts::read(parser)?.into_value(parser)?,
        Token::StartRef => Value::from_ref(RefInfo::read(parser)?)?,
        Token::StartSet => Value::Page(read_page(parser, Token::EndSet, decode_value)?),
        Token::FieldName
        | Token::EndObject
        | Token::EndArray
        | Token::EndDocument
        | Token::EndRef
        | Token::EndSet => return Err(parser.mismatch("value")),
    })
}

/// Encodes a value. Objects whose keys collide with a tag are escaped.
pub fn encode_value(gen: &mut TaggedGenerator, value: &Value) -> Result<()> {
    match value {
        Value::Null => gen.write_null(),
        Value::Bool(b) => gen.write_bool(*b),
        Value::Int(v) => gen.write_int(*v),
        Value::Long(v) => gen.write_long(*v),
        Value::Double(v) => gen.write_double(*v),
        Value::String(s) => gen.write_string(s),
        Value::Bytes(b) => gen.write_bytes(&b.0),
        Value::Date(d) => gen.write_date(*d),
        Value::Time(t) => gen.write_time(*t),
        Value::Module(m) => gen.write_module(m.name()),
        Value::Array(items) => {
            gen.write_start_array()?;
            for item in items {
                encode_value(gen, item)?;
            }
            gen.write_end_array()
        }
        Value::Object(map) => {
            let escaped = needs_escape(map.keys().map(String::as_str));
            if escaped {
                gen.write_start_escaped_object()?;
            } else {
                gen.write_start_object()?;
            }
            for (key, item) in map {
                gen.write_field_name(key)?;
                encode_value(gen, item)?;
            }
            if escaped {
                gen.write_end_escaped_object()
            } else {
                gen.write_end_object()
            }
        }
        Value::Document(doc) => write_ref(gen, &DocumentKey::Id(doc.id.clone()), &doc.coll),
        Value::NamedDocument(doc) => {
            write_ref(gen, &DocumentKey::Name(doc.name.clone()), &doc.coll)
        }
        Value::Ref(r) => write_ref(gen, &DocumentKey::Id(r.id.clone()), &r.coll),
        Value::NamedRef(r) => write_ref(gen, &DocumentKey::Name(r.name.clone()), &r.coll),
        Value::NullDocument(null) => write_ref(gen, &null.key, &null.coll),
        Value::Page(page) => write_page(gen, page, encode_value),
    }
}

pub struct ValueCodec;

impl Codec<Value> for ValueCodec {
    fn decode(&self, parser: &mut TaggedParser<'_>) -> Result<Value> {
        decode_value(parser)
    }

    fn encode(&self, gen: &mut TaggedGenerator, value: &Value) -> Result<()> {
        encode_value(gen, value)
    }
}

impl WireType for Value {
    const NULLABLE: bool = true;

    fn build_codec(_registry: &CodecRegistry) -> Result<CodecRef<Self>> {
        Ok(Arc::new(ValueCodec))
    }

    fn from_ref(info: RefInfo) -> Result<Self> {
        let info = match info.into_missing() {
            Ok(null) => return Ok(Value::NullDocument(null)),
            Err(info) => info,
        };
        Ok(match info.key {
            DocumentKey::Id(id) => Value::Ref(DocumentRef {
                id,
                coll: info.coll,
            }),
            DocumentKey::Name(name) => Value::NamedRef(NamedDocumentRef {
                name,
                coll: info.coll,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::types::Module;
    use serde_json::json;

    fn decode(text: &str) -> Result<Value> {
        CodecRegistry::new().decode_str(text)
    }

    fn encode(value: &Value) -> String {
        CodecRegistry::new().encode(value).unwrap()
    }

    #[test]
    fn scalars_follow_their_tags() {
        assert_eq!(decode(r#"{"@int":"1"}"#).unwrap(), Value::Int(1));
        assert_eq!(decode(r#"{"@long":"1"}"#).unwrap(), Value::Long(1));
        assert_eq!(decode(r#"{"@double":"1"}"#).unwrap(), Value::Double(1.0));
        assert_eq!(
            decode(r#"{"@mod":"Users"}"#).unwrap(),
            Value::Module(Module::new("Users"))
        );
        assert_eq!(decode("null").unwrap(), Value::Null);
    }

    #[test]
    fn untagged_numbers_take_narrowest_width() {
        let v = decode("[1, 3000000000, 1.5]").unwrap();
        assert_eq!(
            v,
            Value::Array(vec![
                Value::Int(1),
                Value::Long(3_000_000_000),
                Value::Double(1.5)
            ])
        );
    }

    #[test]
    fn objects_keep_wire_order() {
        let v = decode(r#"{"z":1,"a":2,"m":3}"#).unwrap();
        let keys: Vec<_> = v.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn escaped_object_round_trip() {
        let text = r#"{"@object":{"@int":"not an int","x":{"@int":"1"}}}"#;
        let v = decode(text).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj["@int"], Value::String("not an int".into()));
        assert_eq!(obj["x"], Value::Int(1));
        assert_eq!(encode(&v), text);
    }

    #[test]
    fn plain_object_is_not_escaped() {
        let v = Value::from(json!({"a": "b"}));
        assert_eq!(encode(&v), r#"{"a":"b"}"#);
    }

    #[test]
    fn document_value() {
        let v = decode(r#"{"@doc":{"id":"7","coll":{"@mod":"Users"},"name":"Bo"}}"#).unwrap();
        let doc = v.as_document().unwrap();
        assert_eq!(doc.id, "7");
        assert_eq!(v.get("name").unwrap(), Some(&Value::String("Bo".into())));
    }

    #[test]
    fn named_document_value() {
        let v = decode(r#"{"@doc":{"name":"Users","coll":{"@mod":"Collection"}}}"#).unwrap();
        assert!(matches!(v, Value::NamedDocument(ref d) if d.name == "Users"));
    }

    #[test]
    fn refs_and_missing_refs() {
        let v = decode(r#"{"@ref":{"id":"1","coll":{"@mod":"Users"}}}"#).unwrap();
        assert!(matches!(v, Value::Ref(ref r) if r.id == "1"));

        let v = decode(r#"{"@ref":{"name":"f","coll":{"@mod":"Function"}}}"#).unwrap();
        assert!(matches!(v, Value::NamedRef(ref r) if r.name == "f"));

        let v = decode(r#"{"@ref":{"id":"2","coll":{"@mod":"Users"},"exists":false}}"#).unwrap();
        assert!(matches!(
            v.as_document(),
            Err(CodecError::UnresolvedDocument { ref cause, .. }) if cause == "not found"
        ));
    }

    #[test]
    fn sets_become_pages() {
        let v = decode(r#"{"@set":{"data":[{"@int":"1"}],"after":"abc"}}"#).unwrap();
        let Value::Page(page) = &v else {
            panic!("expected page, got {}", v.kind());
        };
        assert_eq!(page.data, vec![Value::Int(1)]);
        assert_eq!(page.after.as_deref(), Some("abc"));
        assert_eq!(encode(&v), r#"{"@set":{"data":[{"@int":"1"}],"after":"abc"}}"#);
    }

    #[test]
    fn nested_tagged_values_round_trip() {
        let text = r#"{"a":[{"@date":"2023-01-02"},{"@bytes":"AAE="},{"@long":"-5"}],"b":{"c":null}}"#;
        let v = decode(text).unwrap();
        assert_eq!(encode(&v), text);
    }
}
