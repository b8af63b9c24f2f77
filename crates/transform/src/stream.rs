//! Streaming transform (C4): the Responses → Anthropic SSE state machine.
//!
//! This is the hardest of the transforms: Responses streams one flat,
//! per-item event sequence, while Anthropic's grammar requires exactly one
//! content block open at a time, in strict `start → delta* → stop` order.
//! [`StreamTransformer`] consumes decoded Responses events one at a time and
//! yields zero or more Anthropic events per call; it never looks ahead and
//! never suspends.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::protocol::anthropic::{
    BlockDelta, ContentBlock, MessageDeltaFields, MessageEnvelope, StreamEvent, Usage, UsageDelta,
};

#[derive(Debug, Clone)]
struct ToolCallState {
    call_id: String,
    name: String,
    partial_json: String,
    emitted_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ActiveBlock {
    Text,
    Tool(String),
}

/// Per-request state for the Responses→Anthropic streaming conversion.
///
/// Owned exclusively by the task serving one HTTP request; never shared.
pub struct StreamTransformer {
    message_id: String,
    model: String,
    keep_reasoning_summary: bool,
    started: bool,
    content_index: u32,
    active_block: Option<ActiveBlock>,
    active_index: Option<u32>,
    tool_calls: HashMap<String, ToolCallState>,
    tool_queue: Vec<String>,
    pending_text: Vec<String>,
    response_usage: Option<Value>,
    stop_reason: Option<String>,
    reasoning_summary: String,
    reasoning_emitted: bool,
    ended: bool,
}

impl StreamTransformer {
    pub fn new(model: impl Into<String>, message_id: Option<String>, keep_reasoning_summary: bool) -> Self {
        Self {
            message_id: message_id.unwrap_or_else(|| format!("msg_{}", Uuid::new_v4().simple())),
            model: model.into(),
            keep_reasoning_summary,
            started: false,
            content_index: 0,
            active_block: None,
            active_index: None,
            tool_calls: HashMap::new(),
            tool_queue: Vec::new(),
            pending_text: Vec::new(),
            response_usage: None,
            stop_reason: None,
            reasoning_summary: String::new(),
            reasoning_emitted: false,
            ended: false,
        }
    }

    /// True once a terminal event has been processed (or [`Self::finish`] has
    /// run). No further events should be pushed.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Feed one decoded Responses SSE event, returning the Anthropic events
    /// it produces, in order.
    pub fn push(&mut self, event: &Value) -> Vec<StreamEvent> {
        if self.ended {
            return Vec::new();
        }
        let Some(event_type) = event.get("type").and_then(Value::as_str) else {
            return Vec::new();
        };

        if let Some(rest) = event_type.strip_prefix("response.reasoning_summary") {
            return self.handle_reasoning_summary(rest, event);
        }
        if event_type.starts_with("response.reasoning") {
            return Vec::new();
        }

        match event_type {
            "response.created" => {
                if let Some(model) = event.get("response").and_then(|r| r.get("model")).and_then(Value::as_str) {
                    self.model = model.to_string();
                }
                Vec::new()
            }
            "response.output_item.added" => self.handle_output_item_added(event),
            "response.output_text.delta" | "response.refusal.delta" => self.handle_text_delta(event),
            "response.output_text.done" => Vec::new(),
            "response.function_call_arguments.delta" => self.handle_function_call_arguments_delta(event),
            "response.function_call_arguments.done" => self.handle_function_call_arguments_done(event),
            "response.custom_tool_call_input.delta" => self.handle_custom_tool_call_input_delta(event),
            "response.custom_tool_call_input.done" => self.handle_custom_tool_call_input_done(event),
            "response.output_item.done" => self.handle_output_item_done(event),
            "response.completed" | "response.incomplete" | "response.failed" => self.handle_terminal(event),
            _ => Vec::new(),
        }
    }

    /// Called once the upstream connection closes. If a terminal event was
    /// already processed this returns nothing; otherwise it synthesizes a
    /// best-effort close so the client still receives a well-formed stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.ended || !self.started {
            self.ended = true;
            return Vec::new();
        }
        let mut out = Vec::new();
        out.extend(self.close_active_block());
        if self.keep_reasoning_summary && !self.reasoning_summary.is_empty() && !self.reasoning_emitted {
            out.extend(self.emit_thinking_block());
        }
        out.push(StreamEvent::MessageDelta {
            delta: MessageDeltaFields {
                stop_reason: Some(self.stop_reason.clone().unwrap_or_else(|| "end_turn".to_string())),
                stop_sequence: None,
            },
            usage: UsageDelta::default(),
        });
        out.push(StreamEvent::MessageStop);
        self.ended = true;
        out
    }

    fn handle_reasoning_summary(&mut self, suffix: &str, event: &Value) -> Vec<StreamEvent> {
        if !self.keep_reasoning_summary {
            return Vec::new();
        }
        if suffix == ".delta" {
            if let Some(delta) = event.get("delta").and_then(Value::as_str) {
                self.reasoning_summary.push_str(delta);
            }
        } else if suffix == ".done" {
            if let Some(summary) = event
                .get("summary")
                .and_then(Value::as_str)
                .or_else(|| event.get("text").and_then(Value::as_str))
                .or_else(|| event.get("delta").and_then(Value::as_str))
            {
                self.reasoning_summary = summary.to_string();
            }
        } else if let Some(summary) =
            event.get("summary").and_then(Value::as_str).or_else(|| event.get("text").and_then(Value::as_str))
        {
            self.reasoning_summary = summary.to_string();
        }
        Vec::new()
    }

    fn handle_output_item_added(&mut self, event: &Value) -> Vec<StreamEvent> {
        let Some(item) = event.get("item") else { return Vec::new() };
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();

        if item_type == "reasoning" && self.keep_reasoning_summary {
            if let Some(summary) =
                item.get("summary").and_then(Value::as_str).or_else(|| item.get("text").and_then(Value::as_str))
            {
                self.reasoning_summary = summary.to_string();
            }
            return Vec::new();
        }

        if item_type == "function_call" || item_type == "custom_tool_call" {
            let item_id = item
                .get("id")
                .and_then(Value::as_str)
                .or_else(|| event.get("item_id").and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();
            let call_id = item
                .get("call_id")
                .and_then(Value::as_str)
                .unwrap_or(&item_id)
                .to_string();
            let name = item.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            self.tool_calls.insert(
                item_id.clone(),
                ToolCallState { call_id, name, partial_json: String::new(), emitted_chars: 0 },
            );
            self.tool_queue.push(item_id);
        }
        Vec::new()
    }

    fn handle_text_delta(&mut self, event: &Value) -> Vec<StreamEvent> {
        let mut out = self.ensure_message_started();
        let Some(delta) = event.get("delta").and_then(Value::as_str) else { return out };
        if delta.is_empty() {
            return out;
        }
        if matches!(self.active_block, Some(ActiveBlock::Tool(_))) {
            self.pending_text.push(delta.to_string());
            return out;
        }
        out.extend(self.ensure_text_block());
        out.push(StreamEvent::ContentBlockDelta {
            index: self.active_index.expect("text block just ensured"),
            delta: BlockDelta::TextDelta { text: delta.to_string() },
        });
        out
    }

    fn handle_function_call_arguments_delta(&mut self, event: &Value) -> Vec<StreamEvent> {
        let item_id = event.get("item_id").and_then(Value::as_str).unwrap_or_default().to_string();
        let Some(delta) = event.get("delta").and_then(Value::as_str) else { return Vec::new() };
        if !self.tool_calls.contains_key(&item_id) {
            return Vec::new();
        }

        let buffered_len = {
            let tc = self.tool_calls.get_mut(&item_id).unwrap();
            let before = tc.partial_json.len();
            tc.partial_json.push_str(delta);
            before
        };

        let mut out = self.ensure_message_started();
        out.extend(self.ensure_tool_block(&item_id, false));

        if self.active_block.as_ref() == Some(&ActiveBlock::Tool(item_id.clone())) {
            let index = self.active_index.expect("tool block just ensured");
            let tc = self.tool_calls.get_mut(&item_id).unwrap();
            if tc.emitted_chars < buffered_len {
                let prefix = tc.partial_json[tc.emitted_chars..buffered_len].to_string();
                if !prefix.is_empty() {
                    out.push(StreamEvent::ContentBlockDelta { index, delta: BlockDelta::InputJsonDelta { partial_json: prefix } });
                    tc.emitted_chars = buffered_len;
                }
            }
            out.push(StreamEvent::ContentBlockDelta {
                index,
                delta: BlockDelta::InputJsonDelta { partial_json: delta.to_string() },
            });
            tc.emitted_chars += delta.len();
        }
        out
    }

    fn handle_function_call_arguments_done(&mut self, event: &Value) -> Vec<StreamEvent> {
        let item_id = event.get("item_id").and_then(Value::as_str).unwrap_or_default().to_string();
        if !self.tool_calls.contains_key(&item_id) {
            return Vec::new();
        }

        let mut out = self.ensure_message_started();
        out.extend(self.ensure_tool_block(&item_id, true));

        if let Some(args) = event.get("arguments").and_then(Value::as_str) {
            let tc = self.tool_calls.get_mut(&item_id).unwrap();
            if tc.partial_json.is_empty() {
                tc.partial_json = args.to_string();
            }
            if self.active_block.as_ref() == Some(&ActiveBlock::Tool(item_id.clone())) {
                let index = self.active_index.expect("tool block just ensured");
                let tc = self.tool_calls.get_mut(&item_id).unwrap();
                if tc.emitted_chars < tc.partial_json.len() {
                    let suffix = tc.partial_json[tc.emitted_chars..].to_string();
                    if !suffix.is_empty() {
                        out.push(StreamEvent::ContentBlockDelta {
                            index,
                            delta: BlockDelta::InputJsonDelta { partial_json: suffix },
                        });
                        tc.emitted_chars = tc.partial_json.len();
                    }
                }
            }
        }
        out
    }

    fn handle_custom_tool_call_input_delta(&mut self, event: &Value) -> Vec<StreamEvent> {
        let item_id = event.get("item_id").and_then(Value::as_str).unwrap_or_default();
        if let Some(tc) = self.tool_calls.get_mut(item_id)
            && let Some(delta) = event.get("delta").and_then(Value::as_str)
        {
            tc.partial_json.push_str(delta);
        }
        Vec::new()
    }

    fn handle_custom_tool_call_input_done(&mut self, event: &Value) -> Vec<StreamEvent> {
        let item_id = event.get("item_id").and_then(Value::as_str).unwrap_or_default().to_string();
        if !self.tool_calls.contains_key(&item_id) {
            return Vec::new();
        }
        let raw = event
            .get("input")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.tool_calls[&item_id].partial_json.clone());
        let wrapped = serde_json::to_string(&serde_json::json!({"input": raw})).unwrap_or_default();
        self.tool_calls.get_mut(&item_id).unwrap().partial_json = wrapped.clone();

        let mut out = self.ensure_message_started();
        out.extend(self.ensure_tool_block(&item_id, true));
        let index = self.active_index.expect("tool block just ensured");
        out.push(StreamEvent::ContentBlockDelta { index, delta: BlockDelta::InputJsonDelta { partial_json: wrapped } });
        out
    }

    fn handle_output_item_done(&mut self, event: &Value) -> Vec<StreamEvent> {
        let Some(item) = event.get("item") else { return Vec::new() };
        let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();

        if item_type == "message" {
            return self.close_active_block();
        }

        if item_type == "function_call" || item_type == "custom_tool_call" {
            let item_id = item.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            let mut out = self.ensure_message_started();
            out.extend(self.ensure_tool_block(&item_id, true));
            out.extend(self.close_active_block());
            if !self.pending_text.is_empty() {
                out.extend(self.ensure_text_block());
                let index = self.active_index.expect("text block just ensured");
                for chunk in std::mem::take(&mut self.pending_text) {
                    out.push(StreamEvent::ContentBlockDelta { index, delta: BlockDelta::TextDelta { text: chunk } });
                }
            }
            return out;
        }

        Vec::new()
    }

    fn handle_terminal(&mut self, event: &Value) -> Vec<StreamEvent> {
        if let Some(response) = event.get("response") {
            self.response_usage = response.get("usage").cloned();
            if self.keep_reasoning_summary && self.reasoning_summary.is_empty() {
                if let Some(summary) = response.get("reasoning_summary").and_then(Value::as_str) {
                    let trimmed = summary.trim();
                    if !trimmed.is_empty() {
                        self.reasoning_summary = summary.to_string();
                    }
                }
            }
            if response.get("incomplete_details").and_then(|d| d.get("reason")).and_then(Value::as_str)
                == Some("max_tokens")
            {
                self.stop_reason = Some("max_tokens".to_string());
            }
            if let Some(last) = response.get("output").and_then(Value::as_array).and_then(|o| o.last()) {
                let last_type = last.get("type").and_then(Value::as_str);
                if matches!(last_type, Some("function_call" | "custom_tool_call")) {
                    self.stop_reason.get_or_insert_with(|| "tool_use".to_string());
                }
            }
            self.stop_reason.get_or_insert_with(|| "end_turn".to_string());
        }

        let mut out = self.close_active_block();
        if self.keep_reasoning_summary && !self.reasoning_summary.is_empty() && !self.reasoning_emitted {
            out.extend(self.emit_thinking_block());
        }
        out.extend(self.ensure_message_started());

        let output_tokens = self
            .response_usage
            .as_ref()
            .and_then(|u| u.get("output_tokens"))
            .and_then(Value::as_u64);

        out.push(StreamEvent::MessageDelta {
            delta: MessageDeltaFields { stop_reason: self.stop_reason.clone(), stop_sequence: None },
            usage: UsageDelta { output_tokens },
        });
        out.push(StreamEvent::MessageStop);
        self.ended = true;
        out
    }

    fn ensure_message_started(&mut self) -> Vec<StreamEvent> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        vec![StreamEvent::MessageStart {
            message: MessageEnvelope {
                id: self.message_id.clone(),
                r#type: "message",
                role: "assistant",
                content: Vec::new(),
                model: self.model.clone(),
                stop_reason: None,
                stop_sequence: None,
                usage: Usage { input_tokens: Some(0), output_tokens: Some(0) },
            },
        }]
    }

    fn ensure_text_block(&mut self) -> Vec<StreamEvent> {
        if self.active_block == Some(ActiveBlock::Text) {
            return Vec::new();
        }
        let mut out = self.close_active_block();
        self.active_block = Some(ActiveBlock::Text);
        self.active_index = Some(self.content_index);
        self.content_index += 1;
        out.push(StreamEvent::ContentBlockStart {
            index: self.active_index.unwrap(),
            content_block: ContentBlock::Text { text: String::new() },
        });
        out
    }

    /// Open the tool block for `item_id` if it is the head of `tool_queue`.
    /// When `emit_buffered` is set, any JSON accumulated before this call
    /// flushes as a single trailing delta.
    fn ensure_tool_block(&mut self, item_id: &str, emit_buffered: bool) -> Vec<StreamEvent> {
        if self.active_block.as_ref() == Some(&ActiveBlock::Tool(item_id.to_string())) {
            return Vec::new();
        }
        if self.tool_queue.first().map(String::as_str) != Some(item_id) {
            return Vec::new();
        }
        let Some(tc) = self.tool_calls.get(item_id).cloned() else { return Vec::new() };

        let mut out = self.close_active_block();
        self.active_block = Some(ActiveBlock::Tool(item_id.to_string()));
        self.active_index = Some(self.content_index);
        self.content_index += 1;
        let index = self.active_index.unwrap();

        out.push(StreamEvent::ContentBlockStart {
            index,
            content_block: ContentBlock::ToolUse { id: tc.call_id.clone(), name: tc.name.clone(), input: serde_json::json!({}) },
        });
        out.push(StreamEvent::ContentBlockDelta { index, delta: BlockDelta::InputJsonDelta { partial_json: String::new() } });

        if emit_buffered {
            let tc = self.tool_calls.get_mut(item_id).unwrap();
            if tc.emitted_chars < tc.partial_json.len() {
                let suffix = tc.partial_json[tc.emitted_chars..].to_string();
                if !suffix.is_empty() {
                    out.push(StreamEvent::ContentBlockDelta { index, delta: BlockDelta::InputJsonDelta { partial_json: suffix } });
                    tc.emitted_chars = tc.partial_json.len();
                }
            }
        }
        out
    }

    fn close_active_block(&mut self) -> Vec<StreamEvent> {
        let Some(active) = self.active_block.take() else { return Vec::new() };
        let index = self.active_index.take().expect("active_index set alongside active_block");
        if let ActiveBlock::Tool(item_id) = &active
            && self.tool_queue.first().map(String::as_str) == Some(item_id.as_str())
        {
            self.tool_queue.remove(0);
        }
        vec![StreamEvent::ContentBlockStop { index }]
    }

    fn emit_thinking_block(&mut self) -> Vec<StreamEvent> {
        let text = self.reasoning_summary.trim().to_string();
        if text.is_empty() {
            return Vec::new();
        }
        let mut out = self.ensure_message_started();
        out.extend(self.close_active_block());
        let index = self.content_index;
        self.content_index += 1;
        out.push(StreamEvent::ContentBlockStart {
            index,
            content_block: ContentBlock::Thinking { thinking: String::new(), signature: String::new() },
        });
        out.push(StreamEvent::ContentBlockDelta { index, delta: BlockDelta::ThinkingDelta { thinking: text } });
        out.push(StreamEvent::ContentBlockStop { index });
        self.reasoning_emitted = true;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_types(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::event_name).collect()
    }

    #[test]
    fn plain_text_stream_emits_single_block() {
        let mut st = StreamTransformer::new("gpt-5", Some("msg_1".into()), false);
        let mut all = Vec::new();
        all.extend(st.push(&json!({"type": "response.created", "response": {"model": "gpt-5"}})));
        all.extend(st.push(&json!({"type": "response.output_text.delta", "delta": "hi"})));
        all.extend(st.push(&json!({"type": "response.output_text.delta", "delta": " there"})));
        all.extend(st.push(&json!({"type": "response.output_item.done", "item": {"type": "message"}})));
        all.extend(st.push(&json!({"type": "response.completed", "response": {"output": [], "usage": {"output_tokens": 2}}})));

        assert_eq!(
            event_types(&all),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
    }

    #[test]
    fn text_buffers_while_tool_active_then_flushes_after_close() {
        let mut st = StreamTransformer::new("gpt-5", None, false);
        let mut all = Vec::new();
        all.extend(st.push(&json!({
            "type": "response.output_item.added",
            "item": {"type": "function_call", "id": "item_1", "call_id": "call_1", "name": "get_weather"},
        })));
        all.extend(st.push(&json!({"type": "response.function_call_arguments.delta", "item_id": "item_1", "delta": "{}"})));
        all.extend(st.push(&json!({"type": "response.output_text.delta", "delta": "buffered"})));
        all.extend(st.push(&json!({
            "type": "response.output_item.done",
            "item": {"type": "function_call", "id": "item_1"},
        })));

        let kinds = event_types(&all);
        assert!(kinds.contains(&"content_block_start"));
        let last_three = &kinds[kinds.len() - 3..];
        assert_eq!(last_three, &["content_block_stop", "content_block_start", "content_block_delta"]);
    }

    #[test]
    fn second_tool_call_waits_for_head_of_queue() {
        let mut st = StreamTransformer::new("gpt-5", None, false);
        st.push(&json!({"type": "response.output_item.added", "item": {"type": "function_call", "id": "a", "call_id": "call_a", "name": "f"}}));
        st.push(&json!({"type": "response.output_item.added", "item": {"type": "function_call", "id": "b", "call_id": "call_b", "name": "g"}}));

        let events = st.push(&json!({"type": "response.function_call_arguments.delta", "item_id": "b", "delta": "{\"x\":1}"}));
        assert!(events.iter().all(|e| !matches!(e, StreamEvent::ContentBlockStart { .. })));
    }

    #[test]
    fn unterminated_stream_synthesizes_close() {
        let mut st = StreamTransformer::new("gpt-5", None, false);
        let mut all = Vec::new();
        all.extend(st.push(&json!({"type": "response.output_text.delta", "delta": "hi"})));
        all.extend(st.finish());
        let kinds = event_types(&all);
        assert_eq!(kinds.last(), Some(&"message_stop"));
        assert!(kinds.contains(&"content_block_stop"));
    }

    #[test]
    fn empty_stream_finish_emits_nothing() {
        let mut st = StreamTransformer::new("gpt-5", None, false);
        assert!(st.finish().is_empty());
    }

    #[test]
    fn reasoning_summary_becomes_trailing_thinking_block_when_flagged() {
        let mut st = StreamTransformer::new("gpt-5", None, true);
        let mut all = Vec::new();
        all.extend(st.push(&json!({"type": "response.reasoning_summary.delta", "delta": "pondering"})));
        all.extend(st.push(&json!({"type": "response.output_text.delta", "delta": "hi"})));
        all.extend(st.push(&json!({"type": "response.completed", "response": {"output": [], "usage": {}}})));

        let has_thinking = all.iter().any(|e| matches!(e, StreamEvent::ContentBlockStart { content_block: ContentBlock::Thinking { .. }, .. }));
        assert!(has_thinking);
    }

    #[test]
    fn max_tokens_stop_reason_derivation() {
        let mut st = StreamTransformer::new("gpt-5", None, false);
        let events = st.push(&json!({
            "type": "response.incomplete",
            "response": {"output": [], "usage": {}, "incomplete_details": {"reason": "max_tokens"}},
        }));
        let delta = events.iter().find_map(|e| match e {
            StreamEvent::MessageDelta { delta, .. } => Some(delta.clone()),
            _ => None,
        });
        assert_eq!(delta.unwrap().stop_reason.as_deref(), Some("max_tokens"));
    }

    #[test]
    fn unknown_tool_call_id_ignored_silently() {
        let mut st = StreamTransformer::new("gpt-5", None, false);
        let events = st.push(&json!({"type": "response.function_call_arguments.delta", "item_id": "missing", "delta": "x"}));
        assert!(events.is_empty());
    }

    #[test]
    fn events_after_terminal_are_ignored() {
        let mut st = StreamTransformer::new("gpt-5", None, false);
        st.push(&json!({"type": "response.completed", "response": {"output": [], "usage": {}}}));
        assert!(st.is_ended());
        let events = st.push(&json!({"type": "response.output_text.delta", "delta": "late"}));
        assert!(events.is_empty());
    }
}
