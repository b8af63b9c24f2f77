//! Types for the south-side OpenAI Responses API.
//!
//! The streaming envelope (`response.created`, `response.output_item.added`,
//! …) is intentionally *not* modeled as a single tagged enum: the event
//! namespace is dotted and open-ended (`response.reasoning.*` grows new
//! leaves over time per the upstream's own docs), so the streaming state
//! machine in `crate::stream` matches on the raw `type` string of a decoded
//! JSON object instead. What *is* modeled strongly here is the `output` item
//! list, shared by the batch response transform and by the streaming
//! transform's `output_item.added|done` handling.

use serde::Deserialize;
use serde_json::Value;

/// A single entry in a Responses `output` array.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        content: Vec<MessageContentPart>,
    },
    FunctionCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
    },
    CustomToolCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Option<String>,
    },
    FunctionCallOutput {
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        output: Option<Value>,
    },
    Reasoning {
        #[serde(default)]
        summary: Option<Value>,
        #[serde(default)]
        text: Option<Value>,
    },
    /// Any other item type. Rendered as a text block carrying its JSON
    /// serialization when `keep_unknown` is requested by the item transform.
    #[serde(untagged)]
    Unknown(Value),
}

impl OutputItem {
    pub fn item_type(&self) -> &str {
        match self {
            OutputItem::Message { .. } => "message",
            OutputItem::FunctionCall { .. } => "function_call",
            OutputItem::CustomToolCall { .. } => "custom_tool_call",
            OutputItem::FunctionCallOutput { .. } => "function_call_output",
            OutputItem::Reasoning { .. } => "reasoning",
            OutputItem::Unknown(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, OutputItem::FunctionCall { .. } | OutputItem::CustomToolCall { .. })
    }
}

/// A single content part inside a Responses `message` item.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContentPart {
    InputText {
        #[serde(default)]
        text: String,
    },
    OutputText {
        #[serde(default)]
        text: String,
    },
    InputImage {
        #[serde(default)]
        image_url: Option<Value>,
        #[serde(default)]
        url: Option<String>,
    },
    Image {
        #[serde(default)]
        image_url: Option<Value>,
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(untagged)]
    Unknown(Value),
}

impl MessageContentPart {
    /// Extract a URL from any of the three shapes a Responses image part may
    /// use: a bare string at `image_url`, `{url}` at `image_url`, or a bare
    /// string at `url`.
    pub fn image_url(&self) -> Option<&str> {
        let (image_url, url) = match self {
            MessageContentPart::InputImage { image_url, url } | MessageContentPart::Image { image_url, url } => {
                (image_url.as_ref(), url.as_deref())
            }
            _ => return None,
        };
        if let Some(value) = image_url {
            if let Some(s) = value.as_str() {
                return Some(s);
            }
            if let Some(s) = value.get("url").and_then(Value::as_str) {
                return Some(s);
            }
        }
        url
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContentPart::InputText { text } | MessageContentPart::OutputText { text } => Some(text),
            _ => None,
        }
    }
}

/// Usage counters carried on a Responses object (`response.usage`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
}

/// The `incomplete_details` field of a terminal Responses object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncompleteDetails {
    #[serde(default)]
    pub reason: Option<String>,
}

/// A full Responses object, as returned by the non-streaming endpoint or
/// embedded in a terminal streaming event's `response` field.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub incomplete_details: Option<IncompleteDetails>,
}

impl ResponseObject {
    /// Derive the Anthropic `stop_reason` from this response, per the rule
    /// shared by the batch transform and the streaming terminal handler.
    pub fn stop_reason(&self) -> &'static str {
        if self.incomplete_details.as_ref().and_then(|d| d.reason.as_deref()) == Some("max_tokens") {
            return "max_tokens";
        }
        if self.output.last().is_some_and(OutputItem::is_tool_call) {
            return "tool_use";
        }
        "end_turn"
    }
}
