//! The call envelope sent to the query endpoint.

use indexmap::IndexMap;
use tracing::trace;

use fql_codec::{CodecError, CodecRegistry, TaggedGenerator, WireType};

use crate::query::{Argument, Query};

/// `{"query": <fql>, "arguments": {name: <tagged>}}`. The `arguments`
/// member is omitted when there are none.
#[derive(Debug)]
pub struct QueryRequest {
    query: Query,
    arguments: IndexMap<String, Box<dyn Argument>>,
}

impl QueryRequest {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            arguments: IndexMap::new(),
        }
    }

    /// Binds a named argument; a later binding of the same name replaces
    /// the earlier one.
    pub fn argument<T: WireType>(mut self, name: impl Into<String>, value: T) -> Self {
        self.arguments.insert(name.into(), Box::new(value));
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn argument_names(&self) -> impl Iterator<Item = &str> {
        self.arguments.keys().map(String::as_str)
    }

    pub fn encode_to(
        &self,
        registry: &CodecRegistry,
        gen: &mut TaggedGenerator,
    ) -> Result<(), CodecError> {
        gen.write_start_object()?;
        gen.write_field_name("query")?;
        self.query.encode_to(registry, gen)?;
        if !self.arguments.is_empty() {
            // Argument names are literal keys: a name spelling a tag must not
            // be read back as one.
            let escaped = fql_codec::token::needs_escape(self.argument_names());
            gen.write_field_name("arguments")?;
            if escaped {
                gen.write_start_escaped_object()?;
            } else {
                gen.write_start_object()?;
            }
            for (name, value) in &self.arguments {
                gen.write_field_name(name)?;
                value.encode_argument(registry, gen)?;
            }
            if escaped {
                gen.write_end_escaped_object()?;
            } else {
                gen.write_end_object()?;
            }
        }
        gen.write_end_object()
    }

    pub fn encode(&self, registry: &CodecRegistry) -> Result<String, CodecError> {
        let mut gen = TaggedGenerator::new();
        self.encode_to(registry, &mut gen)?;
        let body = gen.finish_string();
        trace!(bytes = body.len(), arguments = self.arguments.len(), "encoded query request");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn encode(request: &QueryRequest) -> serde_json::Value {
        serde_json::from_str(&request.encode(&CodecRegistry::new()).unwrap()).unwrap()
    }

    #[test]
    fn request_without_arguments() {
        let request = QueryRequest::new(Query::literal("1 + 1"));
        assert_eq!(encode(&request), json!({"query": {"fql": ["1 + 1"]}}));
    }

    #[test]
    fn request_with_arguments() {
        let request = QueryRequest::new(Query::literal("Users.byBirthday(day)"))
            .argument("day", NaiveDate::from_ymd_opt(2000, 1, 2).unwrap())
            .argument("limit", 3_000_000_000i64);
        assert_eq!(
            encode(&request),
            json!({
                "query": {"fql": ["Users.byBirthday(day)"]},
                "arguments": {
                    "day": {"@date": "2000-01-02"},
                    "limit": {"@long": "3000000000"}
                }
            })
        );
    }

    #[test]
    fn tag_named_arguments_are_escaped() {
        let request = QueryRequest::new(Query::literal("x")).argument("@mod", true);
        assert_eq!(
            encode(&request),
            json!({"query": {"fql": ["x"]}, "arguments": {"@object": {"@mod": true}}})
        );
    }
}
