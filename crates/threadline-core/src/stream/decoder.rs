//! Buffered decoder for `text/event-stream` bodies

/// One raw server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if present
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
            id: None,
        }
    }
}

/// Incremental SSE decoder
///
/// Bytes are buffered until a blank line closes an event, so multi-byte
/// characters and events split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a network chunk, returning every event it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some((end, delimiter_len)) = find_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + delimiter_len).take(end).collect();
            if let Some(frame) = parse_block(&String::from_utf8_lossy(&block)) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush a final event the server did not terminate with a blank line
    pub fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buffer);
        parse_block(&String::from_utf8_lossy(&rest))
    }

    pub fn has_remaining(&self) -> bool {
        self.buffer.iter().any(|b| !b.is_ascii_whitespace())
    }
}

/// Position and length of the first blank-line delimiter
fn find_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buffer.len() {
        if buffer[i] == b'\n' {
            if buffer.get(i + 1) == Some(&b'\n') {
                return Some((i, 2));
            }
            if buffer.get(i + 1) == Some(&b'\r') && buffer.get(i + 2) == Some(&b'\n') {
                return Some((i, 3));
            }
        }
        i += 1;
    }
    None
}

fn parse_block(text: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut id = None;
    let mut data: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            "id" => id = Some(value.to_string()),
            _ => {}
        }
    }

    if data.is_empty() && event.is_none() {
        return None;
    }

    Some(SseFrame {
        event,
        data: data.join("\n"),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b"event: values\ndata: {\"messages\":[]}\n\n");
        assert_eq!(frames, vec![SseFrame::new("values", "{\"messages\":[]}")]);
        assert!(!decoder.has_remaining());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: metad").is_empty());
        assert!(decoder.feed(b"ata\ndata: {\"run_id\"").is_empty());
        let frames = decoder.feed(b": \"r1\"}\n\nevent: end\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event.as_deref(), Some("metadata"));
        assert_eq!(frames[0].data, "{\"run_id\": \"r1\"}");
        assert_eq!(frames[1].event.as_deref(), Some("end"));
    }

    #[test]
    fn test_multibyte_character_split() {
        let payload = "event: messages\ndata: \"привет\"\n\n".as_bytes();
        let mut decoder = SseDecoder::new();
        let split = payload.iter().position(|b| *b >= 0x80).unwrap() + 1;
        assert!(decoder.feed(&payload[..split]).is_empty());
        let frames = decoder.feed(&payload[split..]);
        assert_eq!(frames[0].data, "\"привет\"");
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(b": heartbeat\r\n\r\nevent: custom\r\ndata: 1\r\ndata: 2\r\n\r\n");
        assert_eq!(frames, vec![SseFrame::new("custom", "1\n2")]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: end\ndata: null").is_empty());
        assert_eq!(decoder.finish(), Some(SseFrame::new("end", "null")));
        assert_eq!(decoder.finish(), None);
    }
}
