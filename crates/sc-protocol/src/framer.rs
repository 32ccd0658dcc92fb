//! Byte-level line splitting for the event stream.
//!
//! Network reads split frames at arbitrary byte offsets, including inside
//! multi-byte UTF-8 sequences. Bytes are held until a `\n` arrives and only
//! complete lines are decoded as text.

/// Accumulates raw bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read. Returns every line completed by this chunk,
    /// without the trailing `\n` or `\r\n`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(decode(&self.buf[start..end]));
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Take whatever partial line is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = decode(&self.buf);
        self.buf.clear();
        Some(line)
    }

    /// Number of bytes waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_multiple_lines() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"data: a\n\ndata: b\n\n");
        assert_eq!(lines, vec!["data: a", "", "data: b", ""]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn partial_line_is_retained() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"data: {\"del").is_empty());
        assert_eq!(framer.pending(), 11);
        let lines = framer.push(b"ta\": \"x\"}\n\n");
        assert_eq!(lines, vec!["data: {\"delta\": \"x\"}", ""]);
    }

    #[test]
    fn split_utf8_sequence() {
        let text = "data: é\n".as_bytes();
        // 'é' is two bytes; split between them
        let split = text.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let mut framer = LineFramer::new();
        assert!(framer.push(&text[..split]).is_empty());
        assert_eq!(framer.push(&text[split..]), vec!["data: é"]);
    }

    #[test]
    fn crlf_is_stripped() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"data: x\r\n\r\n"), vec!["data: x", ""]);
    }

    #[test]
    fn finish_returns_trailing_fragment() {
        let mut framer = LineFramer::new();
        framer.push(b"data: [DONE]");
        assert_eq!(framer.finish().as_deref(), Some("data: [DONE]"));
        assert_eq!(framer.finish(), None);
    }
}
