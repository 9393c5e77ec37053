//! Decoding of the response envelope.
//!
//! A successful body carries the tagged result under `data` next to
//! plain-JSON metadata; a failed one carries an `error` object instead.

use indexmap::IndexMap;
use tracing::debug;

use fql_codec::{
    wire_record, CodecError, CodecRegistry, FieldSet, Record, TaggedParser, Token, WireType,
};

use crate::error::QueryError;

/// Resource usage reported with every response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    pub compute_ops: i64,
    pub read_ops: i64,
    pub write_ops: i64,
    pub query_time_ms: i64,
    pub contention_retries: i64,
    pub storage_bytes_read: i64,
    pub storage_bytes_write: i64,
    pub rate_limits_hit: Vec<String>,
}

impl Record for QueryStats {
    fn describe(fields: &mut FieldSet<Self>) {
        fields.field("compute_ops", |s| &s.compute_ops, |s| &mut s.compute_ops);
        fields.field("read_ops", |s| &s.read_ops, |s| &mut s.read_ops);
        fields.field("write_ops", |s| &s.write_ops, |s| &mut s.write_ops);
        fields.field("query_time_ms", |s| &s.query_time_ms, |s| &mut s.query_time_ms);
        fields.field(
            "contention_retries",
            |s| &s.contention_retries,
            |s| &mut s.contention_retries,
        );
        fields.field(
            "storage_bytes_read",
            |s| &s.storage_bytes_read,
            |s| &mut s.storage_bytes_read,
        );
        fields.field(
            "storage_bytes_write",
            |s| &s.storage_bytes_write,
            |s| &mut s.storage_bytes_write,
        );
        fields.field(
            "rate_limits_hit",
            |s| &s.rate_limits_hit,
            |s| &mut s.rate_limits_hit,
        );
    }
}

wire_record!(QueryStats);

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySuccess<T> {
    pub data: T,
    pub static_type: Option<String>,
    pub summary: Option<String>,
    /// Transaction timestamp in microseconds since the epoch.
    pub txn_ts: Option<i64>,
    pub stats: Option<QueryStats>,
    pub query_tags: IndexMap<String, String>,
}

/// A service-reported error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFailure {
    pub code: String,
    pub message: String,
    pub summary: Option<String>,
    pub txn_ts: Option<i64>,
    pub stats: Option<QueryStats>,
    pub query_tags: IndexMap<String, String>,
}

/// Parses the `k1=v1,k2=v2` form query tags travel in.
pub fn parse_query_tags(text: &str) -> IndexMap<String, String> {
    text.split(',')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

fn optional_string(parser: &TaggedParser<'_>) -> Result<Option<String>, CodecError> {
    match parser.current() {
        Some(Token::Null) => Ok(None),
        _ => parser.as_str().map(|s| Some(s.to_owned())),
    }
}

fn read_error(parser: &mut TaggedParser<'_>, failure: &mut QueryFailure) -> Result<(), CodecError> {
    parser.expect(Token::StartObject)?;
    loop {
        if parser.next_token()? == Token::EndObject {
            return Ok(());
        }
        let name = parser.field_name()?.to_owned();
        parser.next_token()?;
        match name.as_str() {
            "code" => failure.code = parser.as_str()?.to_owned(),
            "message" => failure.message = parser.as_str()?.to_owned(),
            _ => parser.skip()?,
        }
    }
}

/// Decodes a complete response body, yielding the success envelope or the
/// service's failure.
pub fn decode_response<T: WireType>(
    registry: &CodecRegistry,
    body: &[u8],
) -> Result<QuerySuccess<T>, QueryError> {
    let mut parser = registry.parser(body);
    parser.next_token()?;
    parser.expect(Token::StartObject)?;

    let mut data = None;
    let mut failure: Option<QueryFailure> = None;
    let mut static_type = None;
    let mut summary = None;
    let mut txn_ts = None;
    let mut stats = None;
    let mut query_tags = IndexMap::new();
    loop {
        if parser.next_token()? == Token::EndObject {
            break;
        }
        let name = parser.field_name()?.to_owned();
        parser.next_token()?;
        match name.as_str() {
            "data" => {
                data = Some(
                    registry
                        .decode_value::<T>(&mut parser)
                        .map_err(|e| e.in_field("data"))?,
                )
            }
            "error" => read_error(&mut parser, failure.get_or_insert_with(QueryFailure::default))?,
            "static_type" => static_type = optional_string(&parser)?,
            "summary" => summary = optional_string(&parser)?,
            "txn_ts" => txn_ts = Some(parser.as_i64()?),
            "stats" => stats = Some(registry.decode_value::<QueryStats>(&mut parser)?),
            "query_tags" => {
                if let Some(text) = optional_string(&parser)? {
                    query_tags = parse_query_tags(&text);
                }
            }
            _ => parser.skip()?,
        }
    }
    if parser.advance()?.is_some() {
        return Err(CodecError::malformed(body.len(), "trailing data after response").into());
    }

    if let Some(mut failure) = failure {
        failure.summary = summary;
        failure.txn_ts = txn_ts;
        failure.stats = stats;
        failure.query_tags = query_tags;
        debug!(code = %failure.code, "query failed");
        return Err(QueryError::Failure(failure));
    }
    let data = data
        .ok_or_else(|| CodecError::malformed(body.len(), "response has neither data nor error"))?;
    Ok(QuerySuccess {
        data,
        static_type,
        summary,
        txn_ts,
        stats,
        query_tags,
    })
}
