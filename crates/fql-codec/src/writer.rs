//! Growable output buffer for JSON text.

/// Appends JSON text to an in-memory buffer.
///
/// # Example
///
/// ```
/// use fql_codec::Writer;
///
/// let mut writer = Writer::new();
/// writer.u8(b'[');
/// writer.json_str("a\"b");
/// writer.u8(b']');
/// assert_eq!(writer.flush(), br#"["a\"b"]"#);
/// ```
pub struct Writer {
    /// The underlying byte buffer.
    pub uint8: Vec<u8>,
    /// Position where the last flush happened.
    pub x0: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    /// Creates a writer with a 4KB initial allocation.
    pub fn new() -> Self {
        Self::with_alloc_size(4 * 1024)
    }

    pub fn with_alloc_size(alloc_size: usize) -> Self {
        Self {
            uint8: Vec::with_capacity(alloc_size),
            x0: 0,
        }
    }

    /// Number of bytes written since the last flush.
    pub fn len(&self) -> usize {
        self.uint8.len() - self.x0
    }

    /// Drops anything written since the last flush.
    pub fn reset(&mut self) {
        self.uint8.truncate(self.x0);
    }

    /// Returns the data written since the last flush and advances the flush position.
    pub fn flush(&mut self) -> Vec<u8> {
        let result = self.uint8[self.x0..].to_vec();
        self.x0 = self.uint8.len();
        result
    }

    #[inline]
    pub fn u8(&mut self, val: u8) {
        self.uint8.push(val);
    }

    #[inline]
    pub fn buf(&mut self, data: &[u8]) {
        self.uint8.extend_from_slice(data);
    }

    #[inline]
    pub fn ascii(&mut self, s: &str) {
        self.uint8.extend_from_slice(s.as_bytes());
    }

    /// Writes `s` as a quoted JSON string.
    pub fn json_str(&mut self, s: &str) {
        let bytes = s.as_bytes();
        // Fast path: printable ASCII without quotes or backslashes.
        if bytes
            .iter()
            .all(|&b| (32..=126).contains(&b) && b != b'"' && b != b'\\')
        {
            self.uint8.reserve(bytes.len() + 2);
            self.uint8.push(b'"');
            self.uint8.extend_from_slice(bytes);
            self.uint8.push(b'"');
            return;
        }
        let quoted = serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
        self.uint8.extend_from_slice(quoted.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quoted(s: &str) -> String {
        let mut w = Writer::new();
        w.json_str(s);
        String::from_utf8(w.flush()).unwrap()
    }

    #[test]
    fn plain_strings_are_copied() {
        assert_eq!(quoted("hello"), "\"hello\"");
        assert_eq!(quoted(""), "\"\"");
        assert_eq!(quoted("日本語"), "\"日本語\"");
    }

    #[test]
    fn control_characters_are_escaped() {
        assert_eq!(quoted("a\nb\tc"), "\"a\\nb\\tc\"");
        assert_eq!(quoted("nul\0"), "\"nul\\u0000\"");
        assert_eq!(quoted("\u{1b}"), "\"\\u001b\"");
    }

    #[test]
    fn non_ascii_takes_the_escaping_path() {
        assert_eq!(quoted("é\"\u{7f}"), "\"é\\\"\u{7f}\"");
        assert_eq!(quoted("\u{1f}x"), "\"\\u001fx\"");
    }

    #[test]
    fn escaped_output_is_valid_json() {
        let s = "quote\" back\\slash \u{7} end";
        let parsed: String = serde_json::from_str(&quoted(s)).unwrap();
        assert_eq!(parsed, s);
    }

    #[test]
    fn flush_advances_and_reset_drops_pending() {
        let mut w = Writer::new();
        w.ascii("abc");
        assert_eq!(w.flush(), b"abc");
        w.ascii("def");
        w.reset();
        assert_eq!(w.len(), 0);
        w.ascii("g");
        assert_eq!(w.flush(), b"g");
    }
}
