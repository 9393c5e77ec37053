//! The tagged value alphabet.
//!
//! Values travel as a stream of [`Token`]s. Scalars are a single token;
//! containers open with a `Start*` token and close with the matching
//! `End*` token. Raw JSON only has one kind of `}`, so both the parser and
//! the generator keep a stack of [`Container`] kinds to know which `End*`
//! a closing brace stands for.

use std::fmt;

/// One semantic token of the tagged wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Null,
    Bool,
    String,
    Int,
    Long,
    Double,
    Date,
    Time,
    Module,
    Bytes,
    FieldName,
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    StartDocument,
    EndDocument,
    StartRef,
    EndRef,
    StartSet,
    EndSet,
}

impl Token {
    pub fn name(&self) -> &'static str {
        match self {
            Token::Null => "null",
            Token::Bool => "bool",
            Token::String => "string",
            Token::Int => "@int",
            Token::Long => "@long",
            Token::Double => "@double",
            Token::Date => "@date",
            Token::Time => "@time",
            Token::Module => "@mod",
            Token::Bytes => "@bytes",
            Token::FieldName => "field name",
            Token::StartObject => "start of object",
            Token::EndObject => "end of object",
            Token::StartArray => "start of array",
            Token::EndArray => "end of array",
            Token::StartDocument => "start of @doc",
            Token::EndDocument => "end of @doc",
            Token::StartRef => "start of @ref",
            Token::EndRef => "end of @ref",
            Token::StartSet => "start of @set",
            Token::EndSet => "end of @set",
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(
            self,
            Token::StartObject
                | Token::StartArray
                | Token::StartDocument
                | Token::StartRef
                | Token::StartSet
        )
    }

    pub fn is_end(&self) -> bool {
        matches!(
            self,
            Token::EndObject | Token::EndArray | Token::EndDocument | Token::EndRef | Token::EndSet
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of an open container on a parser or generator stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Object,
    /// An object wrapped in `{"@object": ...}`; closing it also closes the wrapper.
    EscapedObject,
    Array,
    Document,
    Ref,
    Set,
}

impl Container {
    pub fn start_token(&self) -> Token {
        match self {
            Container::Object | Container::EscapedObject => Token::StartObject,
            Container::Array => Token::StartArray,
            Container::Document => Token::StartDocument,
            Container::Ref => Token::StartRef,
            Container::Set => Token::StartSet,
        }
    }

    pub fn end_token(&self) -> Token {
        match self {
            Container::Object | Container::EscapedObject => Token::EndObject,
            Container::Array => Token::EndArray,
            Container::Document => Token::EndDocument,
            Container::Ref => Token::EndRef,
            Container::Set => Token::EndSet,
        }
    }

    /// Whether this container holds `name: value` pairs.
    pub fn is_keyed(&self) -> bool {
        !matches!(self, Container::Array)
    }
}

/// The reserved `@`-prefixed keys of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Int,
    Long,
    Double,
    Date,
    Time,
    Module,
    Ref,
    Doc,
    Set,
    Object,
    Bytes,
}

impl Tag {
    pub const ALL: [Tag; 11] = [
        Tag::Int,
        Tag::Long,
        Tag::Double,
        Tag::Date,
        Tag::Time,
        Tag::Module,
        Tag::Ref,
        Tag::Doc,
        Tag::Set,
        Tag::Object,
        Tag::Bytes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Int => "@int",
            Tag::Long => "@long",
            Tag::Double => "@double",
            Tag::Date => "@date",
            Tag::Time => "@time",
            Tag::Module => "@mod",
            Tag::Ref => "@ref",
            Tag::Doc => "@doc",
            Tag::Set => "@set",
            Tag::Object => "@object",
            Tag::Bytes => "@bytes",
        }
    }

    pub fn parse(key: &str) -> Option<Tag> {
        if !key.starts_with('@') {
            return None;
        }
        Tag::ALL.into_iter().find(|tag| tag.as_str() == key)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `key` is one of the reserved tags.
pub fn is_reserved(key: &str) -> bool {
    Tag::parse(key).is_some()
}

/// Whether an object with these keys has to be wrapped in `@object`.
pub fn needs_escape<'a, I>(keys: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter().any(is_reserved)
}
