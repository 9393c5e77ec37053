//! Query fragments and their wire form.
//!
//! A query is a sequence of literal FQL text, embedded host values, and
//! nested queries. It encodes as
//! `{"fql": ["text", {"value": <tagged>}, {"fql": [...]}]}`, so values
//! never pass through FQL text and need no quoting.

use std::fmt;

use fql_codec::{CodecError, CodecRegistry, TaggedGenerator, WireType};

/// A host value that can be embedded in a query.
pub trait Argument: Send + Sync {
    fn encode_argument(
        &self,
        registry: &CodecRegistry,
        gen: &mut TaggedGenerator,
    ) -> Result<(), CodecError>;
}

impl<T: WireType> Argument for T {
    fn encode_argument(
        &self,
        registry: &CodecRegistry,
        gen: &mut TaggedGenerator,
    ) -> Result<(), CodecError> {
        registry.encode_value(gen, self)
    }
}

impl fmt::Debug for dyn Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Argument(..)")
    }
}

#[derive(Debug)]
pub enum Fragment {
    Literal(String),
    Value(Box<dyn Argument>),
    Query(Query),
}

#[derive(Debug, Default)]
pub struct Query {
    fragments: Vec<Fragment>,
}

impl Query {
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// A query consisting of a single literal.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::builder().lit(text).build()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn encode_to(
        &self,
        registry: &CodecRegistry,
        gen: &mut TaggedGenerator,
    ) -> Result<(), CodecError> {
        gen.write_start_object()?;
        gen.write_field_name("fql")?;
        gen.write_start_array()?;
        for fragment in &self.fragments {
            match fragment {
                Fragment::Literal(text) => gen.write_string(text)?,
                Fragment::Value(value) => {
                    gen.write_start_object()?;
                    gen.write_field_name("value")?;
                    value.encode_argument(registry, gen)?;
                    gen.write_end_object()?;
                }
                Fragment::Query(query) => query.encode_to(registry, gen)?,
            }
        }
        gen.write_end_array()?;
        gen.write_end_object()
    }

    pub fn encode(&self, registry: &CodecRegistry) -> Result<String, CodecError> {
        let mut gen = TaggedGenerator::new();
        self.encode_to(registry, &mut gen)?;
        Ok(gen.finish_string())
    }
}

/// Assembles a [`Query`] piece by piece. Adjacent literals are merged.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    fragments: Vec<Fragment>,
}

impl QueryBuilder {
    pub fn lit(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return self;
        }
        match self.fragments.last_mut() {
            Some(Fragment::Literal(last)) => last.push_str(&text),
            _ => self.fragments.push(Fragment::Literal(text)),
        }
        self
    }

    pub fn value<T: WireType>(mut self, value: T) -> Self {
        self.fragments.push(Fragment::Value(Box::new(value)));
        self
    }

    pub fn query(mut self, query: Query) -> Self {
        self.fragments.push(Fragment::Query(query));
        self
    }

    pub fn build(self) -> Query {
        Query {
            fragments: self.fragments,
        }
    }
}
