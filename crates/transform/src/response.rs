//! Batch response transform (C3), plus the multi-mode conversion entry point
//! exposed to CLI/library callers.

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
    error::{Result, TransformError},
    item::{ItemTransformFlags, items_to_messages},
    protocol::{
        anthropic::{ContentBlock, MessageEnvelope, Usage},
        responses::{OutputItem, ResponseObject},
    },
};

/// Which shape of OpenAI payload [`convert`] is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Auto,
    Input,
    Response,
    Output,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Mode::Auto),
            "input" => Some(Mode::Input),
            "response" => Some(Mode::Response),
            "output" => Some(Mode::Output),
            _ => None,
        }
    }
}

/// Convert the batch, non-streaming Responses object into an Anthropic
/// `message` envelope (the HTTP surface's non-streaming path, C3 proper).
///
/// Unlike [`convert`], this always discards any derived `system` text (the
/// HTTP surface already has the caller's original `system` field) and keeps
/// only blocks contributed by assistant-role messages.
pub fn batch_to_message(response: &ResponseObject, flags: ItemTransformFlags) -> MessageEnvelope {
    let (_, messages) = items_to_messages(&response.output, None, flags);
    let content: Vec<ContentBlock> = messages
        .into_iter()
        .filter(|(role, _)| role == "assistant")
        .flat_map(|(_, blocks)| blocks)
        .collect();

    MessageEnvelope {
        id: response.id.clone().unwrap_or_else(|| format!("msg_{}", Uuid::new_v4().simple())),
        r#type: "message",
        role: "assistant",
        content,
        model: response.model.clone().unwrap_or_else(|| "unknown".to_string()),
        stop_reason: Some(response.stop_reason().to_string()),
        stop_sequence: None,
        usage: Usage {
            input_tokens: response.usage.as_ref().and_then(|u| u.input_tokens),
            output_tokens: response.usage.as_ref().and_then(|u| u.output_tokens),
        },
    }
}

/// Convert an arbitrary OpenAI Responses-shaped payload into an Anthropic
/// request-shaped `{messages, system?}` object, per `mode`.
///
/// This is the conversion exposed by the CLI's `openai-to-anthropic`
/// subcommand and supports payloads a client never sends over the HTTP
/// surface: a bare `output` item list, or a Responses `input` payload.
pub fn convert(data: &Value, mode: Mode, flags: ItemTransformFlags) -> Result<Value> {
    let mode = if mode == Mode::Auto { auto_detect_mode(data)? } else { mode };

    let (items, instructions) = match mode {
        Mode::Response => {
            let obj = data.as_object().ok_or_else(|| {
                TransformError::InvalidInput("mode=response expects a JSON object with an 'output' list".into())
            })?;
            let output = obj
                .get("output")
                .and_then(Value::as_array)
                .ok_or_else(|| TransformError::InvalidInput("mode=response expects an 'output' array".into()))?;
            let items = parse_items(output)?;
            let instructions = obj.get("instructions").and_then(Value::as_str).map(str::to_string);
            (items, instructions)
        }
        Mode::Output => {
            let array = data
                .as_array()
                .ok_or_else(|| TransformError::InvalidInput("mode=output expects a JSON array".into()))?;
            (parse_items(array)?, None)
        }
        Mode::Input => (normalize_input_to_items(data)?, None),
        Mode::Auto => unreachable!("auto resolved above"),
    };

    let (system, messages) = items_to_messages(&items, instructions.as_deref(), flags);

    let messages_json: Vec<Value> = messages
        .into_iter()
        .map(|(role, blocks)| json!({"role": role, "content": blocks}))
        .collect();

    let mut out = Map::new();
    out.insert("messages".into(), Value::Array(messages_json));
    if let Some(system) = system {
        out.insert("system".into(), json!(system));
    }
    Ok(Value::Object(out))
}

/// Scan a decoded sequence of Responses SSE events for the last terminal
/// event (`response.completed|incomplete|failed`) carrying a `response`
/// object, searching from the end since a well-formed stream carries exactly
/// one. Used by the HTTP surface's force-stream-but-batch-client path, where
/// the upstream is always asked to stream but the caller did not ask to.
pub fn terminal_response(events: &[Value]) -> Result<ResponseObject> {
    for event in events.iter().rev() {
        let Some(obj) = event.as_object() else { continue };
        let is_terminal = matches!(
            obj.get("type").and_then(Value::as_str),
            Some("response.completed" | "response.incomplete" | "response.failed")
        );
        if !is_terminal {
            continue;
        }
        if let Some(response) = obj.get("response").filter(|v| v.is_object()) {
            return serde_json::from_value(response.clone()).map_err(|e| TransformError::InvalidInput(e.to_string()));
        }
    }
    Err(TransformError::UpstreamStreamNoResponse)
}

fn parse_items(values: &[Value]) -> Result<Vec<OutputItem>> {
    values
        .iter()
        .map(|v| serde_json::from_value(v.clone()).map_err(|e| TransformError::InvalidInput(e.to_string())))
        .collect()
}

fn auto_detect_mode(data: &Value) -> Result<Mode> {
    if let Value::Object(obj) = data
        && obj.get("output").is_some_and(Value::is_array)
    {
        return Ok(Mode::Response);
    }
    if let Value::Array(array) = data {
        if let Some(Value::Object(first)) = array.first() {
            let t = first.get("type").and_then(Value::as_str);
            if matches!(t, Some("message" | "function_call" | "reasoning" | "custom_tool_call")) {
                return Ok(Mode::Output);
            }
            if first.contains_key("role") {
                return Ok(Mode::Input);
            }
        }
        return Ok(Mode::Output);
    }
    if let Value::Object(obj) = data
        && obj.contains_key("role")
        && obj.contains_key("content")
    {
        return Ok(Mode::Input);
    }
    Err(TransformError::InvalidInput("could not auto-detect mode for provided data".into()))
}

/// OpenAI Responses `input` can be a bare string, a single `{role, content}`
/// object, or a list mixing both shapes.
fn normalize_input_to_items(data: &Value) -> Result<Vec<OutputItem>> {
    let to_item = |role: &str, content: Value| -> Result<OutputItem> {
        let item = json!({"type": "message", "role": role, "content": content});
        serde_json::from_value(item).map_err(|e| TransformError::InvalidInput(e.to_string()))
    };

    match data {
        Value::String(text) => {
            Ok(vec![to_item("user", json!([{"type": "input_text", "text": text}]))?])
        }
        Value::Object(obj) if obj.contains_key("role") && obj.contains_key("content") => {
            let role = obj.get("role").and_then(Value::as_str).unwrap_or("user");
            Ok(vec![to_item(role, normalize_content(&obj["content"]))?])
        }
        Value::Array(items) => {
            let mut out = Vec::new();
            for entry in items {
                match entry {
                    Value::Object(obj) if obj.contains_key("role") && obj.contains_key("content") => {
                        let role = obj.get("role").and_then(Value::as_str).unwrap_or("user");
                        out.push(to_item(role, normalize_content(&obj["content"]))?);
                    }
                    Value::String(text) => {
                        out.push(to_item("user", json!([{"type": "input_text", "text": text}]))?);
                    }
                    _ => {}
                }
            }
            Ok(out)
        }
        _ => Err(TransformError::InvalidInput("unsupported OpenAI input shape".into())),
    }
}

fn normalize_content(content: &Value) -> Value {
    match content {
        Value::Null => json!([]),
        Value::String(text) => json!([{"type": "input_text", "text": text}]),
        Value::Array(parts) => Value::Array(parts.iter().filter(|p| p.is_object()).cloned().collect()),
        other => json!([{"type": "input_text", "text": other.to_string()}]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_to_message_uses_upstream_id_and_model() {
        let response: ResponseObject = serde_json::from_value(json!({
            "id": "resp_1",
            "model": "gpt-5",
            "output": [{"type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "hi"}]}],
            "usage": {"input_tokens": 3, "output_tokens": 2},
        }))
        .unwrap();
        let message = batch_to_message(&response, ItemTransformFlags::default());
        assert_eq!(message.id, "resp_1");
        assert_eq!(message.model, "gpt-5");
        assert_eq!(message.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(message.usage.input_tokens, Some(3));
        assert_eq!(message.content.len(), 1);
    }

    #[test]
    fn batch_to_message_synthesizes_id_when_absent() {
        let response: ResponseObject = serde_json::from_value(json!({"output": []})).unwrap();
        let message = batch_to_message(&response, ItemTransformFlags::default());
        assert!(message.id.starts_with("msg_"));
        assert_eq!(message.model, "unknown");
    }

    #[test]
    fn batch_to_message_tool_use_stop_reason() {
        let response: ResponseObject = serde_json::from_value(json!({
            "output": [{"type": "function_call", "call_id": "c1", "name": "f", "arguments": "{}"}],
        }))
        .unwrap();
        let message = batch_to_message(&response, ItemTransformFlags::default());
        assert_eq!(message.stop_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn convert_auto_detects_response_mode() {
        let data = json!({
            "output": [{"type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "hi"}]}],
            "instructions": "be nice",
        });
        let out = convert(&data, Mode::Auto, ItemTransformFlags::default()).unwrap();
        assert_eq!(out["system"], json!("be nice"));
        assert_eq!(out["messages"][0]["role"], json!("assistant"));
    }

    #[test]
    fn convert_auto_detects_output_mode_for_bare_item_list() {
        let data = json!([{"type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "hi"}]}]);
        let out = convert(&data, Mode::Auto, ItemTransformFlags::default()).unwrap();
        assert_eq!(out["messages"][0]["role"], json!("assistant"));
    }

    #[test]
    fn convert_auto_detects_input_mode_for_role_list() {
        let data = json!([{"role": "user", "content": "hi"}]);
        let out = convert(&data, Mode::Auto, ItemTransformFlags::default()).unwrap();
        assert_eq!(out["messages"][0]["role"], json!("user"));
    }

    #[test]
    fn convert_input_mode_accepts_bare_string() {
        let data = json!("hello there");
        let out = convert(&data, Mode::Input, ItemTransformFlags::default()).unwrap();
        let messages = out["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], json!("user"));
    }

    #[test]
    fn convert_response_mode_rejects_non_object() {
        let err = convert(&json!([1, 2]), Mode::Response, ItemTransformFlags::default()).unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput(_)));
    }

    #[test]
    fn convert_output_mode_rejects_non_array() {
        let err = convert(&json!({}), Mode::Output, ItemTransformFlags::default()).unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput(_)));
    }

    #[test]
    fn terminal_response_finds_last_completed_event() {
        let events = vec![
            json!({"type": "response.created"}),
            json!({"type": "response.completed", "response": {"id": "r1", "output": []}}),
        ];
        let response = terminal_response(&events).unwrap();
        assert_eq!(response.id.as_deref(), Some("r1"));
    }

    #[test]
    fn terminal_response_errors_when_absent() {
        let events = vec![json!({"type": "response.created"}), json!({"type": "response.output_text.delta"})];
        let err = terminal_response(&events).unwrap_err();
        assert!(matches!(err, TransformError::UpstreamStreamNoResponse));
    }
}
