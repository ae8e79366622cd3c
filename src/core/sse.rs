//! Incremental decoding of `data: <payload>` event streams.
//!
//! Bytes are buffered until a full line is available, so frames and
//! multi-byte characters split across network reads decode intact. Lines
//! that are not `data:` frames, or whose payload is not a recognized JSON
//! object, are dropped without surfacing anything to the caller.

use memchr::memchr;
use serde_json::Value;
use tracing::trace;

/// Payload marking the logical end of the token stream.
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Token(String),
    Done,
    Error(String),
}

/// Splits a byte stream into lines, keeping any unterminated tail for the
/// next read.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = memchr(b'\n', &self.buffer[consumed..]) {
            let end = consumed + offset;
            lines.push(decode_line(&self.buffer[consumed..end]));
            consumed = end + 1;
        }
        self.buffer.drain(..consumed);
        lines
    }

    /// Returns whatever is left once the stream has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = decode_line(&self.buffer);
        self.buffer.clear();
        Some(line)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Stateful decoder turning raw body chunks into [`StreamEvent`]s. One
/// instance must be kept for the whole response.
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineBuffer,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.lines
            .push(chunk)
            .iter()
            .filter_map(|line| parse_line(line))
            .collect()
    }

    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.lines
            .finish()
            .and_then(|line| parse_line(&line))
            .into_iter()
            .collect()
    }
}

pub fn extract_data_payload(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix("data:").map(str::trim)
}

pub fn parse_line(line: &str) -> Option<StreamEvent> {
    if line.trim().is_empty() {
        return None;
    }
    let Some(payload) = extract_data_payload(line) else {
        trace!(line, "Ignoring non-data line");
        return None;
    };
    if payload == DONE_MARKER {
        return Some(StreamEvent::Done);
    }
    parse_payload(payload)
}

/// Classifies a JSON payload by the fields it carries. A `token` wins over
/// an `error`; anything else is noise.
pub fn parse_payload(payload: &str) -> Option<StreamEvent> {
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(err) => {
            trace!(payload, error = %err, "Dropping undecodable frame");
            return None;
        }
    };

    if let Some(token) = value.get("token").and_then(Value::as_str) {
        if !token.is_empty() {
            return Some(StreamEvent::Token(token.to_string()));
        }
    }

    let error = value.get("error").and_then(error_text);
    if error.is_none() {
        trace!(payload, "Dropping frame without token or error");
    }
    error.map(StreamEvent::Error)
}

/// Only a truthy `error` ends the stream; `false`, `0`, `""`, `[]` and `{}`
/// are treated as absent.
fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

pub fn token_frame(token: &str) -> String {
    data_frame(&serde_json::json!({ "token": token }).to_string())
}

pub fn error_frame(message: &str) -> String {
    data_frame(&serde_json::json!({ "error": message }).to_string())
}

pub fn done_frame() -> String {
    data_frame(DONE_MARKER)
}

fn data_frame(payload: &str) -> String {
    format!("data: {payload}\n\n")
}
