//! Types for the north-side Anthropic Messages API: what a Messages client
//! sends as a request, and what it expects back as a batch response or as
//! a stream of server-sent events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body posted to `/v1/messages`.
///
/// Only the fields the request transform (C2) cares about are modeled
/// strongly; everything else a real client might send is ignored rather
/// than rejected, matching the source system's duck-typed tolerance.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub system: Option<SystemPrompt>,
    #[serde(default)]
    pub max_tokens: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default)]
    pub top_p: Option<Value>,
    #[serde(default)]
    pub stream: Option<Value>,
    #[serde(default)]
    pub tools: Option<Vec<Tool>>,
    #[serde(default)]
    pub tool_choice: Option<Value>,
}

/// A single turn in `messages`. Only `user` and `assistant` roles carry
/// forward into the Responses payload; anything else is dropped by C2.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    /// Any other role (e.g. a client sending `"system"` inline). Dropped by
    /// the request transform, never produced by this crate.
    #[serde(other)]
    Other,
}

/// Message content, either shorthand plain text or a list of blocks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum Content {
    #[default]
    Empty,
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Content {
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            Content::Empty => Vec::new(),
            Content::Text(text) => vec![ContentBlock::Text { text }],
            Content::Blocks(blocks) => blocks,
        }
    }
}

/// A single Anthropic content block.
///
/// This type is used both ways: deserialized out of client requests and
/// serialized back into batch responses / streaming `content_block_start`
/// events built by C3/C4/C5.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: ToolResultContent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    Thinking {
        thinking: String,
        #[serde(default)]
        signature: String,
    },
    /// Anything else a client or an upstream item list might carry. Kept
    /// verbatim so the request transform's fail-safe (serialize-to-text)
    /// rule has the original JSON to work with.
    #[serde(untagged)]
    Unknown(Value),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    #[default]
    Empty,
    Text(String),
    Blocks(Vec<Value>),
}

impl ToolResultContent {
    /// Concatenate the `text` fields of any text-typed blocks, matching the
    /// request transform's rule for flattening `tool_result.content`.
    pub fn concat_text(&self) -> String {
        match self {
            ToolResultContent::Empty => String::new(),
            ToolResultContent::Text(text) => text.clone(),
            ToolResultContent::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .map(|b| b.get("text").and_then(Value::as_str).unwrap_or_default())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Url { url: String },
    Base64 { media_type: String, data: String },
}

/// The top-level `system` field: either a plain string or a list of text
/// blocks whose `text` fields are concatenated.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<SystemBlock>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemBlock {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tool {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "input_schema")]
    pub input_schema: Value,
}

/// A complete Anthropic `message` object, as returned by the batch endpoint
/// and embedded (with empty content) in `message_start`.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub r#type: &'static str,
    pub role: &'static str,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
}

/// A streaming event emitted by C4, in Anthropic's streaming grammar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessageEnvelope,
    },
    ContentBlockStart {
        index: u32,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: u32,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: MessageDeltaFields,
        usage: UsageDelta,
    },
    MessageStop,
}

impl StreamEvent {
    /// The `event:` name used when framing this event as SSE (C1).
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageDeltaFields {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
}
