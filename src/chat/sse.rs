//! Incremental parsing of the provider's `text/event-stream` body.
//!
//! Network chunks do not respect line (or UTF-8) boundaries, so bytes are
//! buffered until a full line is available. Only `data:` lines carry
//! payloads; `event:` names are redundant with the payload's `type` field.

use serde::Deserialize;

use super::error::ChatError;

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends a chunk and drains every complete line, without terminators.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    Text(String),
    Stop,
    Error(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Interprets one line of the event stream. Lines that carry no text, stop
/// or error signal map to `None`.
pub fn parse_line(line: &str) -> Result<Option<UpstreamEvent>, ChatError> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let event = match serde_json::from_str::<StreamPayload>(data)? {
        StreamPayload::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } if !text.is_empty() => Some(UpstreamEvent::Text(text)),
        StreamPayload::MessageStop => Some(UpstreamEvent::Stop),
        StreamPayload::Error { error } => Some(UpstreamEvent::Error(error.message)),
        _ => None,
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_joins_lines_split_across_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"event: content_bl").is_empty());
        let lines = buffer.push(b"ock_delta\r\ndata: {}\n\n");
        assert_eq!(lines, vec!["event: content_block_delta", "data: {}", ""]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn line_buffer_keeps_multibyte_characters_intact() {
        let text = "data: caf\u{e9}\n";
        let bytes = text.as_bytes();
        let split = bytes.len() - 2;
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(&bytes[..split]).is_empty());
        assert_eq!(buffer.push(&bytes[split..]), vec!["data: caf\u{e9}"]);
    }

    #[test]
    fn line_buffer_finish_returns_unterminated_tail() {
        let mut buffer = LineBuffer::default();
        buffer.push(b"data: {\"type\":\"message_stop\"}");
        assert_eq!(
            buffer.finish().as_deref(),
            Some("data: {\"type\":\"message_stop\"}")
        );
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn parse_text_delta() {
        let line = r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#;
        assert_eq!(
            parse_line(line).expect("valid line"),
            Some(UpstreamEvent::Text("Hello".to_string()))
        );
    }

    #[test]
    fn parse_ignores_non_text_events() {
        for line in [
            "event: message_start",
            "",
            ": keep-alive",
            r#"data: {"type":"message_start","message":{"id":"msg_1"}}"#,
            r#"data: {"type":"ping"}"#,
            r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#,
            r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":""}}"#,
        ] {
            assert_eq!(parse_line(line).expect("valid line"), None, "{line}");
        }
    }

    #[test]
    fn parse_stop_and_error() {
        assert_eq!(
            parse_line(r#"data: {"type":"message_stop"}"#).expect("valid line"),
            Some(UpstreamEvent::Stop)
        );
        let line = r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(
            parse_line(line).expect("valid line"),
            Some(UpstreamEvent::Error("Overloaded".to_string()))
        );
    }

    #[test]
    fn parse_rejects_malformed_json() {
        let err = parse_line("data: {not json").expect_err("must reject");
        assert!(matches!(err, ChatError::Decode(_)));
    }
}
