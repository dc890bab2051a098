//! Server-sent-events parsing for streamed chat completions.
//!
//! The response body is a sequence of `data: <json>` lines terminated by a
//! `data: [DONE]` sentinel. Network reads split lines arbitrarily, so bytes
//! are buffered until a newline is seen; malformed payloads and payloads
//! without a content delta are ignored.

/// One parsed item from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseItem {
    /// An incremental content delta.
    Delta(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// Incremental line-buffering SSE parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every item completed by them.
    ///
    /// Partial trailing lines stay buffered for the next call, so a delta
    /// split across reads (even mid-codepoint) parses once its newline
    /// arrives.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.buffer.extend_from_slice(bytes);

        let mut items = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(item) = parse_line(line.trim_end_matches(['\n', '\r'])) {
                items.push(item);
            }
        }
        items
    }
}

fn parse_line(line: &str) -> Option<SseItem> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseItem::Done);
    }

    // Malformed JSON and payloads without a content delta (role markers,
    // tool calls, usage frames) are skipped.
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let delta = value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()?;
    Some(SseItem::Delta(delta.to_string()))
}
