//! Request transform (C2): Anthropic Messages JSON → Responses JSON.

use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
    deep_merge::deep_merge,
    error::{Result, TransformError},
    protocol::anthropic::{ContentBlock, ImageSource, Message, Request, Role, SystemPrompt},
};

/// Convert a decoded Anthropic request body into a Responses request body.
///
/// `reasoning_override`, when present, is deep-merged into the outgoing
/// `reasoning` field. The HTTP surface never populates it today (mirroring
/// the source system, which wires the parameter through but never calls it
/// with a value); it exists for programmatic/CLI callers that want to force
/// a reasoning effort regardless of what the client sent.
pub fn convert_request(body: &Value, reasoning_override: Option<&Value>) -> Result<Value> {
    let request: Request =
        serde_json::from_value(body.clone()).map_err(|err| TransformError::InvalidInput(err.to_string()))?;

    if !body.is_object() {
        return Err(TransformError::InvalidInput("request body must be a JSON object".into()));
    }

    let mut out = Map::new();
    if let Some(model) = &request.model {
        out.insert("model".into(), json!(model));
    }
    out.insert("input".into(), json!(messages_to_items(&request.messages)));

    if let Some(system) = &request.system
        && let Some(instructions) = system_to_text(system)
    {
        out.insert("instructions".into(), json!(instructions));
    }

    if let Some(Value::Number(n)) = &request.max_tokens
        && n.is_i64()
    {
        out.insert("max_output_tokens".into(), Value::Number(n.clone()));
    }

    if let Some(temperature) = &request.temperature
        && temperature.is_number()
    {
        out.insert("temperature".into(), temperature.clone());
    }
    if let Some(top_p) = &request.top_p
        && top_p.is_number()
    {
        out.insert("top_p".into(), top_p.clone());
    }
    if let Some(stream) = &request.stream
        && stream.is_boolean()
    {
        out.insert("stream".into(), stream.clone());
    }

    if let Some(tools) = &request.tools {
        let tools: Vec<Value> = tools
            .iter()
            .filter_map(|tool| {
                let name = tool.name.clone()?;
                let parameters = if tool.input_schema.is_null() { json!({}) } else { tool.input_schema.clone() };
                Some(json!({
                    "type": "function",
                    "name": name,
                    "description": tool.description,
                    "parameters": parameters,
                }))
            })
            .collect();
        out.insert("tools".into(), Value::Array(tools));
    }

    if let Some(tool_choice) = &request.tool_choice {
        out.insert("tool_choice".into(), convert_tool_choice(tool_choice));
    }

    if let Some(overrides) = reasoning_override {
        let mut reasoning = out.get("reasoning").cloned().unwrap_or(Value::Null);
        deep_merge(&mut reasoning, overrides);
        if !reasoning.is_null() {
            out.insert("reasoning".into(), reasoning);
        }
    }

    Ok(Value::Object(out))
}

fn convert_tool_choice(choice: &Value) -> Value {
    if choice.is_string() {
        return choice.clone();
    }
    if let Value::Object(map) = choice
        && map.get("type").and_then(Value::as_str) == Some("tool")
        && let Some(name) = map.get("name")
    {
        return json!({"type": "function", "name": name});
    }
    choice.clone()
}

fn system_to_text(system: &SystemPrompt) -> Option<String> {
    let text = match system {
        SystemPrompt::Text(text) => text.clone(),
        SystemPrompt::Blocks(blocks) => blocks
            .iter()
            .filter(|b| b.r#type == "text")
            .map(|b| b.text.as_deref().unwrap_or_default())
            .collect(),
    };
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| text.clone())
}

fn messages_to_items(messages: &[Message]) -> Vec<Value> {
    let mut items = Vec::new();

    for message in messages {
        if message.role == Role::Other {
            continue;
        }
        let role_str = if message.role == Role::User { "user" } else { "assistant" };
        let text_part_type = if message.role == Role::User { "input_text" } else { "output_text" };

        let mut current_parts: Vec<Value> = Vec::new();
        let flush = |items: &mut Vec<Value>, parts: &mut Vec<Value>| {
            if parts.is_empty() {
                return;
            }
            items.push(json!({"type": "message", "role": role_str, "content": std::mem::take(parts)}));
        };

        for block in message.content.clone().into_blocks() {
            match block {
                ContentBlock::Text { text } => {
                    current_parts.push(json!({"type": text_part_type, "text": text}));
                }
                ContentBlock::Image { source } => {
                    let image_part_type = if message.role == Role::Assistant { "output_image" } else { "input_image" };
                    if let Some(part) = image_to_part(&source, image_part_type) {
                        current_parts.push(part);
                    }
                }
                ContentBlock::ToolUse { id, name, input } => {
                    flush(&mut items, &mut current_parts);
                    let args = match &input {
                        Value::String(s) => s.clone(),
                        other => serde_json::to_string(other).unwrap_or_default(),
                    };
                    items.push(json!({
                        "type": "function_call",
                        "id": format!("fc_{}", Uuid::new_v4().simple()),
                        "call_id": id,
                        "name": name,
                        "arguments": args,
                    }));
                }
                ContentBlock::ToolResult { tool_use_id, content, .. } => {
                    flush(&mut items, &mut current_parts);
                    items.push(json!({
                        "type": "function_call_output",
                        "call_id": tool_use_id,
                        "output": content.concat_text(),
                    }));
                }
                ContentBlock::Thinking { .. } => {
                    // Anthropic `thinking` blocks in history have no Responses
                    // counterpart in an outgoing request; dropped.
                }
                ContentBlock::Unknown(value) => {
                    current_parts.push(json!({
                        "type": text_part_type,
                        "text": serde_json::to_string(&value).unwrap_or_default(),
                    }));
                }
            }
        }

        flush(&mut items, &mut current_parts);
    }

    items
}

fn image_to_part(source: &ImageSource, image_part_type: &str) -> Option<Value> {
    let use_object = image_url_object();
    let url = match source {
        ImageSource::Url { url } => url.clone(),
        ImageSource::Base64 { media_type, data } => format!("data:{media_type};base64,{data}"),
    };
    if url.is_empty() {
        return None;
    }
    Some(if use_object {
        json!({"type": image_part_type, "image_url": {"url": url}})
    } else {
        json!({"type": image_part_type, "image_url": url})
    })
}

fn image_url_object() -> bool {
    std::env::var("OPENAI_IMAGE_URL_OBJECT")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
