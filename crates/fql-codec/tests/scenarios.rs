use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{NaiveDate, Timelike};
use fql_codec::{
    wire_record, CodecError, CodecRegistry, Document, FieldSet, FieldType, Module,
    NullableDocument, Page, Record, TaggedGenerator, TaggedParser, Token, Value,
};
use indexmap::IndexMap;
use serde_json::json;

const DOC: &str = r#"{"@doc":{"id":"123","coll":{"@mod":"MyColl"},"ts":{"@time":"2023-12-15T01:01:01.001001Z"},"name":"name_value"}}"#;

#[test]
fn concrete_scenario() {
    let registry = CodecRegistry::new();
    assert_eq!(registry.encode(&42i32).unwrap(), r#"{"@int":"42"}"#);
    assert_eq!(
        registry.encode(&2_147_483_648i64).unwrap(),
        r#"{"@long":"2147483648"}"#
    );
    assert_eq!(
        registry
            .decode_str::<NaiveDate>(r#"{"@date":"2023-12-13"}"#)
            .unwrap(),
        NaiveDate::from_ymd_opt(2023, 12, 13).unwrap()
    );

    let doc: Document = registry.decode_str(DOC).unwrap();
    assert_eq!(doc.id, "123");
    assert_eq!(doc.coll, Module::new("MyColl"));
    assert_eq!(doc.ts.unwrap().nanosecond(), 1_001_000);
    assert_eq!(doc.get("name"), Some(&Value::String("name_value".into())));
}

#[test]
fn page_decode() {
    let page: Page<i32> = CodecRegistry::new()
        .decode_str(r#"{"@set":{"after":"cursor1","data":[{"@int":"1"},{"@int":"2"}]}}"#)
        .unwrap();
    assert_eq!(page.data, vec![1, 2]);
    assert_eq!(page.after.as_deref(), Some("cursor1"));
}

#[test]
fn escaping_is_idempotent() {
    let registry = CodecRegistry::new();
    let mut map = IndexMap::new();
    map.insert("@int".to_string(), "not".to_string());

    let text = registry.encode(&map).unwrap();
    assert_eq!(text, r#"{"@object":{"@int":"not"}}"#);
    let back: IndexMap<String, String> = registry.decode_str(&text).unwrap();
    assert_eq!(back, map);

    // Decoded dynamically the wrapper still yields a map, not an Int.
    let dynamic: Value = registry.decode_str(&text).unwrap();
    assert_eq!(
        dynamic.get("@int").unwrap(),
        Some(&Value::String("not".into()))
    );
    assert_eq!(registry.encode(&dynamic).unwrap(), text);
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Account {
    owner: String,
    balance: i64,
    opened: Option<NaiveDate>,
}

impl Record for Account {
    fn describe(fields: &mut FieldSet<Self>) {
        fields.field("owner", |a| &a.owner, |a| &mut a.owner);
        fields
            .field("balance", |a| &a.balance, |a| &mut a.balance)
            .hint(FieldType::Long);
        fields.field("opened", |a| &a.opened, |a| &mut a.opened);
    }
}

wire_record!(Account);

#[test]
fn unknown_fields_are_ignored() {
    let registry = CodecRegistry::new();
    let plain = r#"{"owner":"ann","balance":{"@long":"10"},"opened":null}"#;
    let noisy = r#"{"owner":"ann","audit":{"@doc":{"id":"9","coll":{"@mod":"Log"},"x":[1,{"@set":"c"}]}},"balance":{"@long":"10"},"flags":[true,false],"opened":null,"@extra":{"@int":"1"}}"#;
    let a: Account = registry.decode_str(plain).unwrap();
    let b: Account = registry.decode_str(noisy).unwrap();
    assert_eq!(a, b);
    assert_eq!(registry.encode(&a).unwrap(), plain);
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Category {
    name: String,
    parent: Option<Box<Category>>,
    children: Vec<Category>,
}

impl Record for Category {
    fn describe(fields: &mut FieldSet<Self>) {
        fields.field("name", |c| &c.name, |c| &mut c.name);
        fields.field("parent", |c| &c.parent, |c| &mut c.parent);
        fields.field("children", |c| &c.children, |c| &mut c.children);
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Ping {
    pong: Option<Box<Pong>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Pong {
    ping: Option<Box<Ping>>,
    hits: i32,
}

impl Record for Ping {
    fn describe(fields: &mut FieldSet<Self>) {
        fields.field("pong", |p| &p.pong, |p| &mut p.pong);
    }
}

impl Record for Pong {
    fn describe(fields: &mut FieldSet<Self>) {
        fields.field("ping", |p| &p.ping, |p| &mut p.ping);
        fields.field("hits", |p| &p.hits, |p| &mut p.hits);
    }
}

wire_record!(Category, Ping, Pong);

#[test]
fn self_referential_types_resolve() {
    let registry = CodecRegistry::new();
    let tree = Category {
        name: "root".into(),
        parent: None,
        children: vec![Category {
            name: "leaf".into(),
            parent: Some(Box::new(Category {
                name: "root".into(),
                ..Category::default()
            })),
            children: vec![],
        }],
    };
    let text = registry.encode(&tree).unwrap();
    assert_eq!(registry.decode_str::<Category>(&text).unwrap(), tree);
}

#[test]
fn mutually_recursive_types_resolve() {
    let registry = CodecRegistry::new();
    let value = Ping {
        pong: Some(Box::new(Pong {
            ping: Some(Box::new(Ping { pong: None })),
            hits: 3,
        })),
    };
    let text = registry.encode(&value).unwrap();
    assert_eq!(
        text,
        r#"{"pong":{"ping":{"pong":null},"hits":{"@int":"3"}}}"#
    );
    assert_eq!(registry.decode_str::<Ping>(&text).unwrap(), value);
    // Either side can be asked for first.
    let fresh = CodecRegistry::new();
    assert!(fresh.get::<Pong>().is_ok());
    assert!(fresh.get::<Ping>().is_ok());
}

#[test]
fn registry_is_shared_across_threads() {
    let registry = Arc::new(CodecRegistry::new());
    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let account = Account {
                    owner: format!("user{i}"),
                    balance: i as i64,
                    opened: None,
                };
                let text = registry.encode(&account).unwrap();
                let tree: Category = registry
                    .decode_str(r#"{"name":"x","children":[{"name":"y"}]}"#)
                    .unwrap();
                assert_eq!(tree.children[0].name, "y");
                registry.decode_str::<Account>(&text).unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap().owner, format!("user{i}"));
    }
}

#[test]
fn missing_document_is_reported_on_access() {
    let registry = CodecRegistry::new();
    let text =
        r#"[{"@ref":{"id":"1","coll":{"@mod":"Users"},"exists":false,"cause":"not found"}}]"#;
    let docs: Vec<NullableDocument<Document>> = registry.decode_str(text).unwrap();
    assert_eq!(docs.len(), 1);
    match docs[0].get() {
        Err(CodecError::UnresolvedDocument { id, coll, cause }) => {
            assert_eq!((id.as_str(), coll.as_str(), cause.as_str()), ("1", "Users", "not found"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn truncated_input_is_malformed() {
    let registry = CodecRegistry::new();
    for text in [r#"{"@int":"1""#, "[1,", r#"{"a":"#, r#"{"@int":"99999999999"}"#] {
        assert!(
            matches!(
                registry.decode_str::<Value>(text),
                Err(CodecError::MalformedStream { .. })
            ),
            "{text}"
        );
    }
}

#[test]
fn plain_json_decodes_as_untagged_subset() {
    let value: Value = CodecRegistry::new()
        .decode_str(&json!({"a": [1, 2.5, "s", null, false]}).to_string())
        .unwrap();
    assert_eq!(value, Value::from(json!({"a": [1, 2.5, "s", null, false]})));
}

#[test]
fn streaming_generator_and_parser_agree() {
    let registry = CodecRegistry::new();
    let mut gen = TaggedGenerator::new();
    gen.write_start_object().unwrap();
    gen.write_field_name("account").unwrap();
    registry
        .encode_value(
            &mut gen,
            &Account {
                owner: "z".into(),
                balance: 1,
                opened: None,
            },
        )
        .unwrap();
    gen.write_field_name("n").unwrap();
    gen.write_int(7).unwrap();
    gen.write_end_object().unwrap();
    let bytes = gen.finish();

    let mut parser = TaggedParser::new(&bytes);
    assert_eq!(parser.next_token().unwrap(), Token::StartObject);
    assert_eq!(parser.next_token().unwrap(), Token::FieldName);
    assert_eq!(parser.field_name().unwrap(), "account");
    parser.next_token().unwrap();
    let account: Account = registry.decode_value(&mut parser).unwrap();
    assert_eq!(account.balance, 1);
    assert_eq!(parser.next_token().unwrap(), Token::FieldName);
    parser.next_token().unwrap();
    assert_eq!(parser.as_i32().unwrap(), 7);
    assert_eq!(parser.next_token().unwrap(), Token::EndObject);
    assert_eq!(parser.advance().unwrap(), None);
    assert_eq!(parser.advance().unwrap_err(), CodecError::StreamExhausted);
}
