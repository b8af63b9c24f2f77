//! Item transform (C5): Responses `output` items → Anthropic messages.
//!
//! Shared by the batch response transform (C3), which discards the derived
//! `system` value and keeps only the assistant blocks, and by the streaming
//! transform's terminal fan-out, which reuses the same block-shape rules for
//! individual items rather than a whole list.

use serde_json::{Value, json};

use crate::protocol::{
    anthropic::{ContentBlock, ImageSource, ToolResultContent},
    responses::{MessageContentPart, OutputItem},
};

/// Flags controlling how items with no direct Anthropic counterpart are
/// rendered, mirroring the three independent toggles in the system this was
/// translated from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemTransformFlags {
    /// Render a bare `reasoning` item (no summary) as a `[openai_reasoning]`
    /// placeholder text block instead of dropping it.
    pub keep_reasoning: bool,
    /// Render any item type this crate doesn't model as a text block
    /// carrying its JSON, instead of silently dropping it.
    pub keep_unknown: bool,
    /// Render a `reasoning` item's summary as a `thinking` block.
    pub keep_reasoning_summary: bool,
}

/// One in-progress Anthropic message being assembled from consecutive items
/// that target the same role.
struct MessageBuilder {
    role: &'static str,
    content: Vec<ContentBlock>,
}

/// Convert an ordered item list into `(system, messages)`.
///
/// `instructions`, when present, seeds the returned system text; an item with
/// `role: "system"` overwrites it (matching the source's hoisting rule, which
/// assigns rather than appends).
pub fn items_to_messages(
    items: &[OutputItem],
    instructions: Option<&str>,
    flags: ItemTransformFlags,
) -> (Option<String>, Vec<(String, Vec<ContentBlock>)>) {
    let mut system = instructions.map(str::to_owned);
    let mut messages: Vec<MessageBuilder> = Vec::new();

    let ensure = |messages: &mut Vec<MessageBuilder>, role: &'static str| -> usize {
        if let Some(last) = messages.last()
            && last.role == role
        {
            return messages.len() - 1;
        }
        messages.push(MessageBuilder { role, content: Vec::new() });
        messages.len() - 1
    };

    for item in items {
        match item {
            OutputItem::Reasoning { summary, text } => {
                let extracted = extract_reasoning_summary(summary, text);
                if flags.keep_reasoning_summary
                    && let Some(summary) = &extracted
                {
                    let idx = ensure(&mut messages, "assistant");
                    messages[idx].content.push(ContentBlock::Thinking {
                        thinking: summary.clone(),
                        signature: String::new(),
                    });
                } else if flags.keep_reasoning {
                    let idx = ensure(&mut messages, "assistant");
                    messages[idx].content.push(ContentBlock::Text { text: "[openai_reasoning]".into() });
                }
            }
            OutputItem::Message { role, content, .. } => {
                let role = role.as_deref().unwrap_or("assistant");
                if role == "system" {
                    if let Some(text) = extract_message_text(content)
                        && !text.is_empty()
                    {
                        system = Some(text);
                    }
                    continue;
                }
                let role = if role == "user" { "user" } else { "assistant" };
                let idx = ensure(&mut messages, role);
                messages[idx].content.extend(message_content_to_blocks(content, flags.keep_unknown));
            }
            OutputItem::FunctionCall { id, call_id, name, arguments } => {
                let id = call_id.clone().or_else(|| id.clone()).unwrap_or_default();
                let name = name.clone().unwrap_or_default();
                let input = match arguments.as_deref() {
                    Some(raw) if !raw.trim().is_empty() => {
                        serde_json::from_str::<Value>(raw).unwrap_or_else(|_| json!({"_raw": raw}))
                    }
                    _ => json!({}),
                };
                let idx = ensure(&mut messages, "assistant");
                messages[idx].content.push(ContentBlock::ToolUse { id, name, input });
            }
            OutputItem::CustomToolCall { id, call_id, name, input } => {
                let id = call_id.clone().or_else(|| id.clone()).unwrap_or_default();
                let name = name.clone().unwrap_or_default();
                let idx = ensure(&mut messages, "assistant");
                messages[idx].content.push(ContentBlock::ToolUse {
                    id,
                    name,
                    input: json!({"input": input.clone().unwrap_or_default()}),
                });
            }
            OutputItem::FunctionCallOutput { call_id, output } => {
                let call_id = call_id.clone().unwrap_or_default();
                let text = match output {
                    Some(value @ (Value::Object(_) | Value::Array(_))) => {
                        serde_json::to_string(value).unwrap_or_default()
                    }
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                let idx = ensure(&mut messages, "user");
                messages[idx].content.push(ContentBlock::ToolResult {
                    tool_use_id: call_id,
                    content: ToolResultContent::Text(text),
                    is_error: None,
                });
            }
            OutputItem::Unknown(value) => {
                if flags.keep_unknown {
                    let idx = ensure(&mut messages, "assistant");
                    messages[idx]
                        .content
                        .push(ContentBlock::Text { text: serde_json::to_string(value).unwrap_or_default() });
                }
            }
        }
    }

    let messages = messages
        .into_iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| (m.role.to_string(), m.content))
        .collect();

    (system, messages)
}

fn message_content_to_blocks(parts: &[MessageContentPart], keep_unknown: bool) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    for part in parts {
        if let Some(text) = part.text() {
            blocks.push(ContentBlock::Text { text: text.to_string() });
            continue;
        }
        if let Some(url) = part.image_url() {
            blocks.push(ContentBlock::Image { source: ImageSource::Url { url: url.to_string() } });
            continue;
        }
        if keep_unknown && let MessageContentPart::Unknown(value) = part {
            blocks.push(ContentBlock::Text { text: serde_json::to_string(value).unwrap_or_default() });
        }
    }
    blocks
}

fn extract_message_text(parts: &[MessageContentPart]) -> Option<String> {
    let text: String = parts.iter().filter_map(|p| p.text()).collect();
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(text)
}

fn extract_reasoning_summary(summary: &Option<Value>, text: &Option<Value>) -> Option<String> {
    let candidate = summary.as_ref().or(text.as_ref())?;
    let s = candidate.as_str()?;
    (!s.trim().is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::responses::OutputItem;
    use serde_json::json;

    fn item(value: Value) -> OutputItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn consecutive_same_role_items_coalesce() {
        let items = vec![
            item(json!({"type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "a"}]})),
            item(json!({"type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "b"}]})),
        ];
        let (_, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1.len(), 2);
    }

    #[test]
    fn system_role_message_hoists_into_system_and_is_dropped() {
        let items = vec![item(
            json!({"type": "message", "role": "system", "content": [{"type": "input_text", "text": "be nice"}]}),
        )];
        let (system, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        assert_eq!(system.as_deref(), Some("be nice"));
        assert!(messages.is_empty());
    }

    #[test]
    fn function_call_parses_json_arguments() {
        let items = vec![item(
            json!({"type": "function_call", "call_id": "call_1", "name": "get_weather", "arguments": "{\"loc\":\"SF\"}"}),
        )];
        let (_, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        match &messages[0].1[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "get_weather");
                assert_eq!(input, &json!({"loc": "SF"}));
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn function_call_falls_back_to_raw_on_invalid_json() {
        let items = vec![item(
            json!({"type": "function_call", "call_id": "call_1", "name": "n", "arguments": "not json"}),
        )];
        let (_, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        match &messages[0].1[0] {
            ContentBlock::ToolUse { input, .. } => assert_eq!(input, &json!({"_raw": "not json"})),
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn function_call_output_goes_to_user_tool_result() {
        let items = vec![item(json!({"type": "function_call_output", "call_id": "call_1", "output": "72F"}))];
        let (_, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        assert_eq!(messages[0].0, "user");
        match &messages[0].1[0] {
            ContentBlock::ToolResult { tool_use_id, content, .. } => {
                assert_eq!(tool_use_id, "call_1");
                assert_eq!(content.concat_text(), "72F");
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn function_call_output_json_serializes_object_output() {
        let items =
            vec![item(json!({"type": "function_call_output", "call_id": "c", "output": {"temp": 72}}))];
        let (_, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        match &messages[0].1[0] {
            ContentBlock::ToolResult { content, .. } => {
                assert_eq!(content.concat_text(), "{\"temp\":72}");
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn reasoning_item_dropped_by_default() {
        let items = vec![item(json!({"type": "reasoning", "summary": "thinking about it"}))];
        let (_, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        assert!(messages.is_empty());
    }

    #[test]
    fn reasoning_item_kept_as_placeholder_when_flagged() {
        let items = vec![item(json!({"type": "reasoning", "summary": "thinking about it"}))];
        let flags = ItemTransformFlags { keep_reasoning: true, ..Default::default() };
        let (_, messages) = items_to_messages(&items, None, flags);
        assert_eq!(messages[0].1.len(), 1);
        match &messages[0].1[0] {
            ContentBlock::Text { text } => assert_eq!(text, "[openai_reasoning]"),
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn reasoning_item_kept_as_thinking_block_when_summary_flag_set() {
        let items = vec![item(json!({"type": "reasoning", "summary": "thinking about it"}))];
        let flags = ItemTransformFlags { keep_reasoning_summary: true, ..Default::default() };
        let (_, messages) = items_to_messages(&items, None, flags);
        match &messages[0].1[0] {
            ContentBlock::Thinking { thinking, .. } => assert_eq!(thinking, "thinking about it"),
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn empty_messages_are_dropped() {
        let items = vec![item(json!({"type": "reasoning", "summary": "x"}))];
        let (_, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        assert!(messages.is_empty());
    }

    #[test]
    fn unknown_item_dropped_unless_flagged() {
        let items = vec![item(json!({"type": "mystery", "foo": "bar"}))];
        let (_, messages) = items_to_messages(&items, None, ItemTransformFlags::default());
        assert!(messages.is_empty());

        let flags = ItemTransformFlags { keep_unknown: true, ..Default::default() };
        let (_, messages) = items_to_messages(&items, None, flags);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn instructions_seed_system_when_no_system_item_present() {
        let items = vec![item(json!({"type": "message", "role": "user", "content": [{"type": "input_text", "text": "hi"}]}))];
        let (system, _) = items_to_messages(&items, Some("be nice"), ItemTransformFlags::default());
        assert_eq!(system.as_deref(), Some("be nice"));
    }
}
