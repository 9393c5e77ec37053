//! Pull lexer over raw JSON text.
//!
//! Emits one [`Raw`] event per JSON token and validates the surrounding
//! punctuation (commas, colons, balanced brackets). It knows nothing about
//! tags; that is the job of [`TaggedParser`](super::TaggedParser).

use crate::error::{CodecError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Raw {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Key(String),
    Str(String),
    Number(Number),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    object: bool,
    first: bool,
    after_key: bool,
}

pub struct Lexer<'a> {
    data: &'a [u8],
    x: usize,
    scopes: Vec<Scope>,
    started: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            x: 0,
            scopes: Vec::new(),
            started: false,
        }
    }

    /// Current byte offset, used for error reporting.
    pub fn offset(&self) -> usize {
        self.x
    }

    /// Next raw token, or `None` once the top-level value is complete and
    /// only whitespace remains.
    pub fn next_raw(&mut self) -> Result<Option<Raw>> {
        self.skip_whitespace();
        if self.started && self.scopes.is_empty() {
            if self.x < self.data.len() {
                return Err(self.invalid("trailing characters after value"));
            }
            return Ok(None);
        }
        self.started = true;
        let Some(ch) = self.peek() else {
            return Err(self.invalid("unexpected end of input"));
        };

        let Some(&Scope {
            object,
            first,
            after_key,
        }) = self.scopes.last()
        else {
            return self.read_value().map(Some);
        };

        if object {
            if after_key {
                if ch != b':' {
                    return Err(self.invalid("expected `:`"));
                }
                self.x += 1;
                self.set_scope(false, false);
                self.skip_whitespace();
                return self.read_value().map(Some);
            }
            if ch == b'}' {
                self.scopes.pop();
                self.x += 1;
                return Ok(Some(Raw::EndObject));
            }
            if !first {
                if ch != b',' {
                    return Err(self.invalid("expected `,` or `}`"));
                }
                self.x += 1;
                self.skip_whitespace();
            }
            self.set_scope(false, true);
            if self.peek() != Some(b'"') {
                return Err(self.invalid("expected object key"));
            }
            return self.read_str().map(|key| Some(Raw::Key(key)));
        }

        if ch == b']' {
            self.scopes.pop();
            self.x += 1;
            return Ok(Some(Raw::EndArray));
        }
        if !first {
            if ch != b',' {
                return Err(self.invalid("expected `,` or `]`"));
            }
            self.x += 1;
            self.skip_whitespace();
        }
        self.set_scope(false, false);
        self.read_value().map(Some)
    }

    fn set_scope(&mut self, first: bool, after_key: bool) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.first = first;
            scope.after_key = after_key;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.x).copied()
    }

    fn invalid(&self, message: &str) -> CodecError {
        CodecError::malformed(self.x, message)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek() {
            self.x += 1;
        }
    }

    fn read_value(&mut self) -> Result<Raw> {
        let Some(ch) = self.peek() else {
            return Err(self.invalid("unexpected end of input"));
        };
        match ch {
            b'{' => {
                self.x += 1;
                self.scopes.push(Scope {
                    object: true,
                    first: true,
                    after_key: false,
                });
                Ok(Raw::BeginObject)
            }
            b'[' => {
                self.x += 1;
                self.scopes.push(Scope {
                    object: false,
                    first: true,
                    after_key: false,
                });
                Ok(Raw::BeginArray)
            }
            b'"' => self.read_str().map(Raw::Str),
            b't' => self.read_literal(b"true", Raw::Bool(true)),
            b'f' => self.read_literal(b"false", Raw::Bool(false)),
            b'n' => self.read_literal(b"null", Raw::Null),
            b'-' | b'0'..=b'9' => self.read_num(),
            _ => Err(self.invalid("unexpected character")),
        }
    }

    fn read_literal(&mut self, word: &[u8], raw: Raw) -> Result<Raw> {
        if self.data[self.x..].starts_with(word) {
            self.x += word.len();
            Ok(raw)
        } else {
            Err(self.invalid("invalid literal"))
        }
    }

    fn read_num(&mut self) -> Result<Raw> {
        let start = self.x;
        let data = self.data;
        let len = data.len();
        let mut x = self.x;

        if x < len && data[x] == b'-' {
            x += 1;
        }
        let digits = x;
        while x < len && data[x].is_ascii_digit() {
            x += 1;
        }
        if x == digits {
            return Err(CodecError::malformed(start, "invalid number"));
        }
        if data[digits] == b'0' && x - digits > 1 {
            return Err(CodecError::malformed(start, "leading zero in number"));
        }
        let mut is_float = false;
        if x < len && data[x] == b'.' {
            is_float = true;
            x += 1;
            let frac = x;
            while x < len && data[x].is_ascii_digit() {
                x += 1;
            }
            if x == frac {
                return Err(CodecError::malformed(start, "missing digits after `.`"));
            }
        }
        if x < len && (data[x] == b'e' || data[x] == b'E') {
            is_float = true;
            x += 1;
            if x < len && (data[x] == b'+' || data[x] == b'-') {
                x += 1;
            }
            let exp = x;
            while x < len && data[x].is_ascii_digit() {
                x += 1;
            }
            if x == exp {
                return Err(CodecError::malformed(start, "missing exponent digits"));
            }
        }
        self.x = x;

        let s = std::str::from_utf8(&data[start..x])
            .map_err(|_| CodecError::malformed(start, "invalid UTF-8"))?;
        if !is_float {
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Raw::Number(Number::Integer(i)));
            }
        }
        s.parse::<f64>()
            .map(|f| Raw::Number(Number::Float(f)))
            .map_err(|_| CodecError::malformed(start, "invalid number"))
    }

    fn read_str(&mut self) -> Result<String> {
        self.x += 1; // opening quote
        let x0 = self.x;
        let x1 = find_ending_quote(self.data, x0)
            .ok_or_else(|| CodecError::malformed(x0, "unterminated string"))?;
        let s = decode_json_string(&self.data[x0..x1])
            .map_err(|message| CodecError::malformed(x0, message))?;
        self.x = x1 + 1;
        Ok(s)
    }
}

fn find_ending_quote(data: &[u8], mut x: usize) -> Option<usize> {
    while x < data.len() {
        match data[x] {
            b'\\' => x += 2,
            b'"' => return Some(x),
            _ => x += 1,
        }
    }
    None
}

/// Decode a JSON string body (between the quotes), handling escapes.
fn decode_json_string(bytes: &[u8]) -> std::result::Result<String, String> {
    if bytes.iter().any(|&b| b < 0x20) {
        return Err("unescaped control character in string".to_string());
    }
    if !bytes.contains(&b'\\') {
        return std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| "invalid UTF-8".to_string());
    }
    // Escapes are rare on this wire; let serde_json handle the full grammar.
    let mut quoted = Vec::with_capacity(bytes.len() + 2);
    quoted.push(b'"');
    quoted.extend_from_slice(bytes);
    quoted.push(b'"');
    serde_json::from_slice::<String>(&quoted).map_err(|e| e.to_string())
}
