//! Log payload scrubber.
//!
//! Recursively masks keys that carry credentials (case-insensitively, at any
//! depth) before a payload is rendered into a log line, and truncates the
//! rendered text to a configurable length. Used for every `anthropic.*` /
//! `openai.*` payload log around the HTTP surface.

use serde_json::Value;

const SENSITIVE_KEYS: &[&str] = &["authorization", "api_key", "x-openai-api-key"];

/// Recursively replace the value of any object key matching (case
/// insensitively) a sensitive key name with the literal string `"***"`.
/// Idempotent: scrubbing an already-scrubbed payload changes nothing.
pub fn scrub(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if SENSITIVE_KEYS.iter().any(|s| s.eq_ignore_ascii_case(k)) {
                        (k.clone(), Value::String("***".to_string()))
                    } else {
                        (k.clone(), scrub(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(scrub).collect()),
        other => other.clone(),
    }
}

/// Serialize `value` to a JSON string, scrub it, and truncate the rendered
/// text to `max_chars`, appending a `...(truncated)` marker when cut.
pub fn scrub_and_truncate(value: &Value, max_chars: usize) -> String {
    let scrubbed = scrub(value);
    let text = serde_json::to_string(&scrubbed).unwrap_or_else(|_| scrubbed.to_string());
    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...(truncated)")
    } else {
        text
    }
}
