//! SSE framing (C1): decoding upstream event text into JSON objects, and
//! encoding Anthropic event objects back into SSE text.
//!
//! Decoding is deliberately forgiving: a malformed `data:` payload is
//! dropped rather than failing the whole stream (a single bad upstream
//! event must not poison the response), and `[DONE]` sentinels are ignored.

use serde_json::Value;

use crate::protocol::anthropic::StreamEvent;

/// Incremental SSE line decoder.
///
/// Feed it lines one at a time (without their trailing newline); it yields
/// a decoded JSON object each time a blank line terminates an event whose
/// buffered `data:` payload parses as a JSON object. Call [`Self::finish`]
/// once the underlying line source is exhausted to flush a trailing,
/// unterminated event.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: Vec<String>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of input. Returns a decoded event if this line
    /// completed one.
    pub fn push_line(&mut self, line: &str) -> Option<Value> {
        if line.is_empty() {
            return self.flush();
        }
        if let Some(rest) = line.strip_prefix("data:") {
            self.buffer.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
        None
    }

    /// Flush any buffered, unterminated event (stream ended without a
    /// trailing blank line).
    pub fn finish(&mut self) -> Option<Value> {
        self.flush()
    }

    fn flush(&mut self) -> Option<Value> {
        if self.buffer.is_empty() {
            return None;
        }
        let payload = self.buffer.join("\n");
        self.buffer.clear();
        decode_payload(&payload)
    }
}

/// Decode a single, already line-framed `data:` payload into a JSON event
/// object, applying the same tolerance rules as the line-oriented decoder:
/// `[DONE]` is dropped, and malformed JSON is dropped rather than failing
/// the stream. Exposed so callers that get events pre-framed by an SSE byte
/// parser (the collaborator that splits bytes into `data:` lines) can still
/// apply C1's JSON-interpretation rules without re-deriving them.
pub fn decode_payload(payload: &str) -> Option<Value> {
    if payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => None,
        Err(err) => {
            log::debug!("dropping malformed SSE event payload: {err}");
            None
        }
    }
}

/// Decode a complete SSE text block (e.g. a fully buffered upstream
/// response body) into its sequence of JSON event objects.
pub fn decode_all(text: &str) -> Vec<Value> {
    let mut decoder = EventDecoder::new();
    let mut events = Vec::new();
    for line in text.lines() {
        if let Some(ev) = decoder.push_line(line.trim_end_matches('\r')) {
            events.push(ev);
        }
    }
    if let Some(ev) = decoder.finish() {
        events.push(ev);
    }
    events
}

/// Encode one Anthropic streaming event as SSE text (`event:` + `data:`
/// lines terminated by a blank line).
pub fn encode_event(event: &StreamEvent) -> String {
    let payload = serde_json::to_string(event).expect("StreamEvent serialization is infallible");
    format!("event: {}\ndata: {}\n\n", event.event_name(), payload)
}
