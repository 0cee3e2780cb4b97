/// Longest line kept while waiting for its newline
pub const MAX_LINE_LEN: usize = 1 << 20;

/// Incremental parser for `text/event-stream` bodies
///
/// Only the `data` field matters to the broker protocol: each event carries
/// one published payload. Multi-line data is joined with `\n`, comments and
/// other fields are skipped. Bytes may be fed in arbitrary chunks.
///
/// An event with an over-long or non UTF-8 line is dropped whole rather
/// than delivered with a hole or replacement characters in it.
#[derive(Debug, Default)]
pub struct SseParser {
    /// Bytes of an incomplete line
    pending: Vec<u8>,
    /// Skipping the rest of an over-long line
    overflowed: bool,
    /// Data lines of the event being assembled
    data: Vec<String>,
    /// The event being assembled lost a line
    corrupt: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the data of every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            if std::mem::take(&mut self.overflowed) {
                // tail of a line already given up on
                continue;
            }
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.len() > MAX_LINE_LEN {
                tracing::warn!("dropping event with a line over {} bytes", MAX_LINE_LEN);
                self.corrupt = true;
                continue;
            }
            match String::from_utf8(line) {
                Ok(line) => {
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                Err(e) => {
                    tracing::warn!("dropping event with a non UTF-8 line: {}", e);
                    self.corrupt = true;
                }
            }
        }

        if self.pending.len() > MAX_LINE_LEN {
            tracing::warn!("dropping event with a line over {} bytes", MAX_LINE_LEN);
            self.pending.clear();
            self.overflowed = true;
            self.corrupt = true;
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            let corrupt = std::mem::take(&mut self.corrupt);
            if self.data.is_empty() || corrupt {
                self.data.clear();
                return None;
            }
            let event = self.data.join("\n");
            self.data.clear();
            return Some(event);
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed(b"data: hello\n\n"), vec!["hello".to_string()]);
    }

    #[test]
    fn test_chunked_input_and_crlf() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: {\"a\":").is_empty());
        assert!(parser.feed(b"1}\r\n").is_empty());
        assert_eq!(parser.feed(b"\r\n"), vec![r#"{"a":1}"#.to_string()]);
    }

    #[test]
    fn test_multiline_data_comments_and_other_fields() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": keepalive\nevent: message\nid: 7\ndata: one\ndata:two\n\n");
        assert_eq!(events, vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn test_blank_lines_without_data_dispatch_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"\n\n: ping\n\n").is_empty());
        assert_eq!(
            parser.feed(b"data: a\n\ndata: b\n\n"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut parser = SseParser::new();
        let payload = "data: héllo\n\n".as_bytes();
        // split inside the two-byte 'é'
        let split = payload.iter().position(|b| *b == 0xc3).unwrap() + 1;
        assert!(parser.feed(&payload[..split]).is_empty());
        assert_eq!(parser.feed(&payload[split..]), vec!["héllo".to_string()]);
    }

    #[test]
    fn test_invalid_utf8_drops_the_event() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: ok\ndata: \xff\xfe\n\n").is_empty());
        assert_eq!(parser.feed(b"data: next\n\n"), vec!["next".to_string()]);
    }

    #[test]
    fn test_overlong_line_is_bounded_and_dropped() {
        let mut parser = SseParser::new();
        let chunk = vec![b'x'; MAX_LINE_LEN / 2 + 1];
        assert!(parser.feed(b"data: ").is_empty());
        for _ in 0..4 {
            assert!(parser.feed(&chunk).is_empty());
            assert!(parser.pending.len() <= MAX_LINE_LEN);
        }

        // the rest of that line and its event go nowhere
        assert!(parser.feed(b"tail\n\n").is_empty());
        assert_eq!(parser.feed(b"data: after\n\n"), vec!["after".to_string()]);
    }
}
