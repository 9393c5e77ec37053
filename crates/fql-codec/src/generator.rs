//! Push writer producing tagged JSON text.
//!
//! One method per [`Token`](crate::Token). Scalars that have no native JSON
//! form are written as single-key wrappers (`write_int(42)` emits
//! `{"@int":"42"}`), containers are opened and closed explicitly. The
//! generator tracks the open containers and panics when an `end_*` call
//! does not match the innermost open container: that is a bug in the
//! calling codec, not a property of the data.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::error::{CodecError, Result};
use crate::token::{Container, Tag};
use crate::writer::Writer;

#[derive(Debug)]
struct Frame {
    kind: Container,
    count: usize,
    named: bool,
}

pub struct TaggedGenerator {
    pub writer: Writer,
    stack: Vec<Frame>,
    done: bool,
}

impl Default for TaggedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TaggedGenerator {
    pub fn new() -> Self {
        Self {
            writer: Writer::new(),
            stack: Vec::new(),
            done: false,
        }
    }

    /// Whether a complete top-level value has been written.
    pub fn is_complete(&self) -> bool {
        self.done
    }

    /// Returns the encoded bytes and readies the generator for another value.
    ///
    /// # Panics
    ///
    /// If a container is still open.
    pub fn finish(&mut self) -> Vec<u8> {
        assert!(
            self.stack.is_empty(),
            "finish() with {} open container(s)",
            self.stack.len()
        );
        self.done = false;
        self.writer.flush()
    }

    /// Like [`finish`](Self::finish), returning the text.
    pub fn finish_string(&mut self) -> String {
        // Every byte written is either ASCII punctuation or a UTF-8 `&str`.
        String::from_utf8_lossy(&self.finish()).into_owned()
    }

    // ----------------------------------------------------------------
    // Containers

    pub fn write_start_object(&mut self) -> Result<()> {
        self.before_value()?;
        self.writer.u8(b'{');
        self.push(Container::Object);
        Ok(())
    }

    pub fn write_end_object(&mut self) -> Result<()> {
        self.pop(Container::Object);
        self.writer.u8(b'}');
        self.after_value();
        Ok(())
    }

    /// Opens an object whose keys may collide with reserved tags; it is
    /// written as `{"@object":{...}}`.
    pub fn write_start_escaped_object(&mut self) -> Result<()> {
        self.before_value()?;
        self.writer.buf(b"{\"@object\":{");
        self.push(Container::EscapedObject);
        Ok(())
    }

    pub fn write_end_escaped_object(&mut self) -> Result<()> {
        self.pop(Container::EscapedObject);
        self.writer.buf(b"}}");
        self.after_value();
        Ok(())
    }

    pub fn write_start_array(&mut self) -> Result<()> {
        self.before_value()?;
        self.writer.u8(b'[');
        self.push(Container::Array);
        Ok(())
    }

    pub fn write_end_array(&mut self) -> Result<()> {
        self.pop(Container::Array);
        self.writer.u8(b']');
        self.after_value();
        Ok(())
    }

    pub fn write_start_document(&mut self) -> Result<()> {
        self.start_wrapped(Tag::Doc, Container::Document)
    }

    pub fn write_end_document(&mut self) -> Result<()> {
        self.end_wrapped(Container::Document)
    }

    pub fn write_start_ref(&mut self) -> Result<()> {
        self.start_wrapped(Tag::Ref, Container::Ref)
    }

    pub fn write_end_ref(&mut self) -> Result<()> {
        self.end_wrapped(Container::Ref)
    }

    pub fn write_start_set(&mut self) -> Result<()> {
        self.start_wrapped(Tag::Set, Container::Set)
    }

    pub fn write_end_set(&mut self) -> Result<()> {
        self.end_wrapped(Container::Set)
    }

    /// Writes the key of the next `name: value` pair.
    ///
    /// # Panics
    ///
    /// Outside a keyed container, or twice without a value in between.
    pub fn write_field_name(&mut self, name: &str) -> Result<()> {
        if self.done {
            return Err(CodecError::StreamExhausted);
        }
        let frame = self
            .stack
            .last_mut()
            .filter(|frame| frame.kind.is_keyed())
            .unwrap_or_else(|| panic!("field name `{name}` written outside an object"));
        assert!(!frame.named, "field name `{name}` written twice without a value");
        if frame.count > 0 {
            self.writer.u8(b',');
        }
        frame.count += 1;
        frame.named = true;
        self.writer.json_str(name);
        self.writer.u8(b':');
        Ok(())
    }

    // ----------------------------------------------------------------
    // Scalars

    pub fn write_null(&mut self) -> Result<()> {
        self.scalar(|w| w.buf(b"null"))
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.scalar(|w| w.buf(if value { b"true" } else { b"false" }))
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.scalar(|w| w.json_str(value))
    }

    pub fn write_int(&mut self, value: i32) -> Result<()> {
        self.tagged(Tag::Int, &value.to_string())
    }

    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.tagged(Tag::Long, &value.to_string())
    }

    pub fn write_double(&mut self, value: f64) -> Result<()> {
        self.tagged(Tag::Double, &format_double(value))
    }

    pub fn write_date(&mut self, value: NaiveDate) -> Result<()> {
        self.tagged(Tag::Date, &value.format("%Y-%m-%d").to_string())
    }

    pub fn write_time(&mut self, value: DateTime<Utc>) -> Result<()> {
        self.tagged(Tag::Time, &value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn write_module(&mut self, name: &str) -> Result<()> {
        self.before_value()?;
        self.writer.buf(b"{\"@mod\":");
        self.writer.json_str(name);
        self.writer.u8(b'}');
        self.after_value();
        Ok(())
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.tagged(Tag::Bytes, &STANDARD.encode(value))
    }

    // ----------------------------------------------------------------
    // Bookkeeping

    /// Writes `{"<tag>":"<text>"}`; `text` must not need JSON escaping.
    fn tagged(&mut self, tag: Tag, text: &str) -> Result<()> {
        self.before_value()?;
        self.writer.buf(b"{\"");
        self.writer.ascii(tag.as_str());
        self.writer.buf(b"\":\"");
        self.writer.ascii(text);
        self.writer.buf(b"\"}");
        self.after_value();
        Ok(())
    }

    fn scalar(&mut self, write: impl FnOnce(&mut Writer)) -> Result<()> {
        self.before_value()?;
        write(&mut self.writer);
        self.after_value();
        Ok(())
    }

    fn start_wrapped(&mut self, tag: Tag, kind: Container) -> Result<()> {
        self.before_value()?;
        self.writer.buf(b"{\"");
        self.writer.ascii(tag.as_str());
        self.writer.buf(b"\":{");
        self.push(kind);
        Ok(())
    }

    fn end_wrapped(&mut self, kind: Container) -> Result<()> {
        self.pop(kind);
        self.writer.buf(b"}}");
        self.after_value();
        Ok(())
    }

    fn before_value(&mut self) -> Result<()> {
        if self.done {
            return Err(CodecError::StreamExhausted);
        }
        if let Some(frame) = self.stack.last_mut() {
            if frame.kind.is_keyed() {
                assert!(frame.named, "value written in {:?} without a field name", frame.kind);
                frame.named = false;
            } else {
                if frame.count > 0 {
                    self.writer.u8(b',');
                }
                frame.count += 1;
            }
        }
        Ok(())
    }

    fn after_value(&mut self) {
        if self.stack.is_empty() {
            self.done = true;
        }
    }

    fn push(&mut self, kind: Container) {
        self.stack.push(Frame {
            kind,
            count: 0,
            named: false,
        });
    }

    fn pop(&mut self, kind: Container) {
        match self.stack.pop() {
            Some(frame) if frame.kind == kind => {
                assert!(!frame.named, "{kind:?} closed after a dangling field name");
            }
            Some(frame) => panic!("cannot close {kind:?}: innermost open container is {:?}", frame.kind),
            None => panic!("cannot close {kind:?}: no container is open"),
        }
    }
}

/// Shortest text that parses back to the same `f64`.
pub(crate) fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        // Debug keeps a fractional part or an exponent, so the value stays a double.
        format!("{value:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(f: impl FnOnce(&mut TaggedGenerator) -> Result<()>) -> String {
        let mut gen = TaggedGenerator::new();
        f(&mut gen).unwrap();
        gen.finish_string()
    }

    #[test]
    fn tagged_scalars() {
        assert_eq!(text(|g| g.write_int(42)), r#"{"@int":"42"}"#);
        assert_eq!(text(|g| g.write_long(-7)), r#"{"@long":"-7"}"#);
        assert_eq!(text(|g| g.write_double(1.5)), r#"{"@double":"1.5"}"#);
        assert_eq!(text(|g| g.write_double(f64::NAN)), r#"{"@double":"NaN"}"#);
        assert_eq!(text(|g| g.write_double(f64::INFINITY)), r#"{"@double":"Infinity"}"#);
        assert_eq!(text(|g| g.write_module("Users")), r#"{"@mod":"Users"}"#);
        assert_eq!(text(|g| g.write_bytes(b"hi")), r#"{"@bytes":"aGk="}"#);
        assert_eq!(
            text(|g| g.write_date(NaiveDate::from_ymd_opt(2023, 12, 13).unwrap())),
            r#"{"@date":"2023-12-13"}"#
        );
    }

    #[test]
    fn time_keeps_microseconds() {
        let t = DateTime::parse_from_rfc3339("2023-12-15T01:01:01.001001Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            text(|g| g.write_time(t)),
            r#"{"@time":"2023-12-15T01:01:01.001001Z"}"#
        );
    }

    #[test]
    fn separators_and_nesting() {
        let out = text(|g| {
            g.write_start_object()?;
            g.write_field_name("a")?;
            g.write_start_array()?;
            g.write_int(1)?;
            g.write_null()?;
            g.write_end_array()?;
            g.write_field_name("b")?;
            g.write_start_ref()?;
            g.write_field_name("id")?;
            g.write_string("1")?;
            g.write_end_ref()?;
            g.write_end_object()
        });
        assert_eq!(out, r#"{"a":[{"@int":"1"},null],"b":{"@ref":{"id":"1"}}}"#);
    }

    #[test]
    fn escaped_object_wraps_the_whole_object() {
        let out = text(|g| {
            g.write_start_escaped_object()?;
            g.write_field_name("@int")?;
            g.write_string("not")?;
            g.write_end_escaped_object()
        });
        assert_eq!(out, r#"{"@object":{"@int":"not"}}"#);
    }

    #[test]
    fn writes_after_completion_fail() {
        let mut gen = TaggedGenerator::new();
        gen.write_bool(true).unwrap();
        assert!(gen.is_complete());
        assert_eq!(gen.write_null().unwrap_err(), CodecError::StreamExhausted);
        assert_eq!(gen.finish(), b"true");
        gen.write_null().unwrap();
        assert_eq!(gen.finish(), b"null");
    }

    #[test]
    #[should_panic(expected = "cannot close")]
    fn mismatched_end_panics() {
        let mut gen = TaggedGenerator::new();
        gen.write_start_array().unwrap();
        let _ = gen.write_end_object();
    }

    #[test]
    #[should_panic(expected = "without a field name")]
    fn value_without_name_panics() {
        let mut gen = TaggedGenerator::new();
        gen.write_start_object().unwrap();
        let _ = gen.write_int(1);
    }

    #[test]
    fn doubles_format_round_trip() {
        for v in [0.0, -0.0, 1.0, 0.1, 1e300, -2.5e-300, f64::MAX, f64::MIN_POSITIVE] {
            let s = format_double(v);
            assert_eq!(s.parse::<f64>().unwrap().to_bits(), v.to_bits(), "{s}");
        }
    }
}
