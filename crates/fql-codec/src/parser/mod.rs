//! Pull parser presenting raw JSON as a stream of tagged [`Token`]s.
//!
//! Tag wrappers are consumed transparently: `{"@int":"42"}` is read as a
//! single [`Token::Int`], while `{"@doc": {...}}` opens a document region
//! whose closing [`Token::EndDocument`] is synthesized when the wrapped
//! object's `}` is reached. An `@object` wrapper opens a plain object whose
//! keys are taken literally, even when they spell a reserved tag.
//!
//! The parser is positioned on a *current* token. Codecs are handed the
//! parser sitting on the first token of their value and leave it on the
//! last token of that value.

pub mod lexer;

use std::collections::VecDeque;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{CodecError, Result};
use crate::options::ParserOptions;
use crate::token::{Container, Tag, Token};
use crate::types::Module;

use lexer::{Lexer, Number, Raw};

/// Where a parser is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    BeforeFirstToken,
    InValue,
    InContainer(Container),
    /// Terminal: every further read fails with [`CodecError::StreamExhausted`].
    Exhausted,
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    None,
    Bool(bool),
    Text(String),
    Int(i32),
    Long(i64),
    Double(f64),
    Date(NaiveDate),
    Time(DateTime<Utc>),
    Bytes(Vec<u8>),
}

pub struct TaggedParser<'a> {
    lexer: Lexer<'a>,
    stack: Vec<Container>,
    pending: VecDeque<(Token, Payload)>,
    current: Option<Token>,
    payload: Payload,
    started: bool,
    exhausted: bool,
    options: ParserOptions,
}

impl<'a> TaggedParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_options(data, ParserOptions::default())
    }

    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }

    pub fn with_options(data: &'a [u8], options: ParserOptions) -> Self {
        Self {
            lexer: Lexer::new(data),
            stack: Vec::new(),
            pending: VecDeque::new(),
            current: None,
            payload: Payload::None,
            started: false,
            exhausted: false,
            options,
        }
    }

    pub fn state(&self) -> ParseState {
        if self.exhausted {
            ParseState::Exhausted
        } else if !self.started {
            ParseState::BeforeFirstToken
        } else {
            match self.stack.last() {
                Some(container) => ParseState::InContainer(*container),
                None => ParseState::InValue,
            }
        }
    }

    /// The token the parser is positioned on.
    pub fn current(&self) -> Option<Token> {
        self.current
    }

    /// Number of open containers.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Moves to the next token. Returns `None` exactly once, after the
    /// top-level value is complete; reading past that point fails with
    /// [`CodecError::StreamExhausted`].
    pub fn advance(&mut self) -> Result<Option<Token>> {
        if self.exhausted {
            return Err(CodecError::StreamExhausted);
        }
        self.started = true;
        if let Some((token, payload)) = self.pending.pop_front() {
            return Ok(Some(self.set(token, payload)));
        }
        let Some(raw) = self.lexer.next_raw()? else {
            self.exhausted = true;
            self.current = None;
            self.payload = Payload::None;
            return Ok(None);
        };
        let (token, payload) = self.translate(raw)?;
        Ok(Some(self.set(token, payload)))
    }

    /// Like [`advance`](Self::advance), but running off the end of the
    /// stream is a [`CodecError::MalformedStream`].
    pub fn next_token(&mut self) -> Result<Token> {
        match self.advance()? {
            Some(token) => Ok(token),
            None => Err(self.malformed("unexpected end of stream")),
        }
    }

    /// Fails with [`CodecError::TypeMismatch`] unless the current token is `token`.
    pub fn expect(&self, token: Token) -> Result<()> {
        let actual = self.require_current()?;
        if actual == token {
            Ok(())
        } else {
            Err(CodecError::mismatch(token.name(), actual))
        }
    }

    /// Consumes the value starting at the current token without
    /// materializing it. Scalars are already consumed; containers are
    /// read up to their matching end.
    pub fn skip(&mut self) -> Result<()> {
        let token = self.require_current()?;
        if !token.is_start() {
            return Ok(());
        }
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.next_token()?;
            if token.is_start() {
                depth += 1;
            } else if token.is_end() {
                depth -= 1;
            }
        }
        Ok(())
    }

    // ----------------------------------------------------------------
    // Current-token accessors

    pub fn as_str(&self) -> Result<&str> {
        match (&self.payload, self.require_current()?) {
            (Payload::Text(s), Token::String) => Ok(s.as_str()),
            (_, actual) => Err(CodecError::mismatch("string", actual)),
        }
    }

    pub fn field_name(&self) -> Result<&str> {
        match (&self.payload, self.require_current()?) {
            (Payload::Text(s), Token::FieldName) => Ok(s.as_str()),
            (_, actual) => Err(CodecError::mismatch("field name", actual)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        self.require_current()?;
        match self.payload {
            Payload::Bool(b) => Ok(b),
            _ => Err(self.mismatch("bool")),
        }
    }

    pub fn as_i32(&self) -> Result<i32> {
        self.require_current()?;
        match self.payload {
            Payload::Int(v) => Ok(v),
            _ => Err(self.mismatch("@int")),
        }
    }

    /// Accepts both `@int` and `@long`.
    pub fn as_i64(&self) -> Result<i64> {
        self.require_current()?;
        match self.payload {
            Payload::Int(v) => Ok(v as i64),
            Payload::Long(v) => Ok(v),
            _ => Err(self.mismatch("@long")),
        }
    }

    /// Accepts every numeric token.
    pub fn as_f64(&self) -> Result<f64> {
        self.require_current()?;
        match self.payload {
            Payload::Int(v) => Ok(v as f64),
            Payload::Long(v) => Ok(v as f64),
            Payload::Double(v) => Ok(v),
            _ => Err(self.mismatch("@double")),
        }
    }

    pub fn as_date(&self) -> Result<NaiveDate> {
        self.require_current()?;
        match self.payload {
            Payload::Date(d) => Ok(d),
            _ => Err(self.mismatch("@date")),
        }
    }

    pub fn as_instant(&self) -> Result<DateTime<Utc>> {
        self.require_current()?;
        match self.payload {
            Payload::Time(t) => Ok(t),
            _ => Err(self.mismatch("@time")),
        }
    }

    pub fn as_module(&self) -> Result<Module> {
        match (&self.payload, self.require_current()?) {
            (Payload::Text(name), Token::Module) => Ok(Module::new(name.clone())),
            (_, actual) => Err(CodecError::mismatch("@mod", actual)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        self.require_current()?;
        match &self.payload {
            Payload::Bytes(b) => Ok(b.as_slice()),
            _ => Err(self.mismatch("@bytes")),
        }
    }

    pub(crate) fn malformed(&self, message: impl Into<String>) -> CodecError {
        CodecError::malformed(self.lexer.offset(), message)
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> CodecError {
        match self.current {
            Some(actual) => CodecError::mismatch(expected, actual),
            None => self.malformed(format!("expected {expected}, found no token")),
        }
    }

    fn require_current(&self) -> Result<Token> {
        if self.exhausted {
            return Err(CodecError::StreamExhausted);
        }
        self.current
            .ok_or_else(|| self.malformed("no current token, call advance first"))
    }

    fn set(&mut self, token: Token, payload: Payload) -> Token {
        self.current = Some(token);
        self.payload = payload;
        token
    }

    // ----------------------------------------------------------------
    // Raw -> tagged translation

    fn translate(&mut self, raw: Raw) -> Result<(Token, Payload)> {
        Ok(match raw {
            Raw::BeginObject => return self.begin_object(),
            Raw::EndObject => return self.end_object(),
            Raw::BeginArray => {
                self.push(Container::Array)?;
                (Token::StartArray, Payload::None)
            }
            Raw::EndArray => {
                self.stack.pop();
                (Token::EndArray, Payload::None)
            }
            Raw::Key(key) => (Token::FieldName, Payload::Text(key)),
            Raw::Str(s) => (Token::String, Payload::Text(s)),
            Raw::Bool(b) => (Token::Bool, Payload::Bool(b)),
            Raw::Null => (Token::Null, Payload::None),
            Raw::Number(Number::Integer(i)) => match i32::try_from(i) {
                Ok(v) => (Token::Int, Payload::Int(v)),
                Err(_) => (Token::Long, Payload::Long(i)),
            },
            Raw::Number(Number::Float(f)) => (Token::Double, Payload::Double(f)),
        })
    }

    fn begin_object(&mut self) -> Result<(Token, Payload)> {
        match self.next_raw()? {
            Raw::EndObject => {
                self.pending.push_back((Token::EndObject, Payload::None));
                Ok((Token::StartObject, Payload::None))
            }
            Raw::Key(key) => match Tag::parse(&key) {
                Some(tag) => self.read_tagged(tag),
                None => {
                    self.push(Container::Object)?;
                    self.pending
                        .push_back((Token::FieldName, Payload::Text(key)));
                    Ok((Token::StartObject, Payload::None))
                }
            },
            other => Err(self.malformed(format!("unexpected {other:?} after `{{`"))),
        }
    }

    fn end_object(&mut self) -> Result<(Token, Payload)> {
        let Some(container) = self.stack.pop() else {
            return Err(self.malformed("unbalanced `}`"));
        };
        match container {
            Container::Object => {}
            Container::Array => return Err(self.malformed("`}` closes an array")),
            Container::EscapedObject
            | Container::Document
            | Container::Ref
            | Container::Set => self.close_wrapper(container.start_token().name())?,
        }
        Ok((container.end_token(), Payload::None))
    }

    fn read_tagged(&mut self, tag: Tag) -> Result<(Token, Payload)> {
        let scalar = match tag {
            Tag::Int => {
                let text = self.tag_text(tag)?;
                let v = text
                    .parse::<i32>()
                    .map_err(|_| self.malformed(format!("invalid @int `{text}`")))?;
                (Token::Int, Payload::Int(v))
            }
            Tag::Long => {
                let text = self.tag_text(tag)?;
                let v = text
                    .parse::<i64>()
                    .map_err(|_| self.malformed(format!("invalid @long `{text}`")))?;
                (Token::Long, Payload::Long(v))
            }
            Tag::Double => {
                let text = self.tag_text(tag)?;
                (Token::Double, Payload::Double(self.parse_double(&text)?))
            }
            Tag::Date => {
                let text = self.tag_text(tag)?;
                let d = NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .map_err(|e| self.malformed(format!("invalid @date `{text}`: {e}")))?;
                (Token::Date, Payload::Date(d))
            }
            Tag::Time => {
                let text = self.tag_text(tag)?;
                let t = DateTime::parse_from_rfc3339(&text)
                    .map_err(|e| self.malformed(format!("invalid @time `{text}`: {e}")))?;
                (Token::Time, Payload::Time(t.with_timezone(&Utc)))
            }
            Tag::Module => {
                let text = self.tag_text(tag)?;
                (Token::Module, Payload::Text(text))
            }
            Tag::Bytes => {
                let text = self.tag_text(tag)?;
                let bytes = STANDARD
                    .decode(text.as_bytes())
                    .map_err(|e| self.malformed(format!("invalid @bytes: {e}")))?;
                (Token::Bytes, Payload::Bytes(bytes))
            }
            Tag::Doc => return self.open_region(tag, Container::Document),
            Tag::Ref => return self.open_region(tag, Container::Ref),
            Tag::Set => return self.open_set(),
            Tag::Object => return self.open_escaped(),
        };
        self.close_wrapper(tag.as_str())?;
        Ok(scalar)
    }

    fn parse_double(&self, text: &str) -> Result<f64> {
        match text {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other if is_decimal(other) => other
                .parse::<f64>()
                .map_err(|_| self.malformed(format!("invalid @double `{other}`"))),
            other => Err(self.malformed(format!("invalid @double `{other}`"))),
        }
    }

    fn open_region(&mut self, tag: Tag, container: Container) -> Result<(Token, Payload)> {
        match self.next_raw()? {
            Raw::BeginObject => {
                self.push(container)?;
                Ok((container.start_token(), Payload::None))
            }
            other => Err(self.malformed(format!("{tag} expects an object, found {other:?}"))),
        }
    }

    fn open_set(&mut self) -> Result<(Token, Payload)> {
        match self.next_raw()? {
            Raw::BeginObject => {
                self.push(Container::Set)?;
                Ok((Token::StartSet, Payload::None))
            }
            // An unmaterialized set is only a cursor.
            Raw::Str(cursor) => {
                self.close_wrapper(Tag::Set.as_str())?;
                self.pending
                    .push_back((Token::FieldName, Payload::Text("after".into())));
                self.pending.push_back((Token::String, Payload::Text(cursor)));
                self.pending.push_back((Token::EndSet, Payload::None));
                Ok((Token::StartSet, Payload::None))
            }
            other => Err(self.malformed(format!("@set expects an object or cursor, found {other:?}"))),
        }
    }

    fn open_escaped(&mut self) -> Result<(Token, Payload)> {
        if self.next_raw()? != Raw::BeginObject {
            return Err(self.malformed("@object expects an object"));
        }
        // The first key is read here so that it is never tag-interpreted.
        match self.next_raw()? {
            Raw::EndObject => {
                self.close_wrapper(Tag::Object.as_str())?;
                self.pending.push_back((Token::EndObject, Payload::None));
            }
            Raw::Key(key) => {
                self.push(Container::EscapedObject)?;
                self.pending
                    .push_back((Token::FieldName, Payload::Text(key)));
            }
            other => return Err(self.malformed(format!("unexpected {other:?} in @object"))),
        }
        Ok((Token::StartObject, Payload::None))
    }

    fn tag_text(&mut self, tag: Tag) -> Result<String> {
        match self.next_raw()? {
            Raw::Str(s) => Ok(s),
            other => Err(self.malformed(format!("{tag} expects a string, found {other:?}"))),
        }
    }

    fn close_wrapper(&mut self, what: &str) -> Result<()> {
        match self.next_raw()? {
            Raw::EndObject => Ok(()),
            _ => Err(self.malformed(format!("{what} wrapper must have exactly one key"))),
        }
    }

    fn next_raw(&mut self) -> Result<Raw> {
        match self.lexer.next_raw()? {
            Some(raw) => Ok(raw),
            None => Err(self.malformed("unexpected end of stream")),
        }
    }

    fn push(&mut self, container: Container) -> Result<()> {
        if self.stack.len() >= self.options.max_depth {
            return Err(self.malformed(format!(
                "nesting deeper than {} levels",
                self.options.max_depth
            )));
        }
        self.stack.push(container);
        Ok(())
    }
}

/// Sign, digits, optional fraction and exponent. Rules out the `inf` and
/// `nan` spellings `f64::from_str` would otherwise take.
fn is_decimal(text: &str) -> bool {
    let body = text.strip_prefix(['-', '+']).unwrap_or(text);
    body.bytes().next().is_some_and(|b| b.is_ascii_digit() || b == b'.')
        && body
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'-' | b'+'))
}
