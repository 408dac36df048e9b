//! Language model transport.
//!
//! The agent talks to models through the [`LlmClient`] trait. Messages follow
//! the OpenAI chat-completions shape, which most hosted endpoints and proxies
//! accept.

mod openai;
mod scripted;

pub use openai::OpenAiClient;
pub use scripted::{RecordedRequest, ScriptedLlm};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from a model call. None of these are recovered by the agent loop.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Message content: either a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenate the text-bearing parts in order.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(ContentPart::as_text)
                .collect::<String>(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Text(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Text(s.to_string())
    }
}

/// Tag of a text part (`"type": "text"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPartKind {
    Text,
}

/// A single part of structured content.
///
/// Parts round-trip unchanged: anything that is not a text part is kept as
/// raw JSON so it can be sent back to the endpoint as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        #[serde(rename = "type")]
        kind: TextPartKind,
        text: String,
        /// Extra fields on the part (annotations, ...).
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    /// Images, refusals, audio...
    Other(Value),
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text {
            kind: TextPartKind::Text,
            text: text.into(),
            extra: Map::new(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text { text, .. } => Some(text),
            ContentPart::Other(_) => None,
        }
    }
}

/// A chat message in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content.into())
    }

    /// A tool-result message answering the call with `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(MessageContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn plain(role: Role, content: String) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content)),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Text of the message, if any.
    pub fn text(&self) -> Option<String> {
        self.content.as_ref().map(MessageContent::text)
    }

    /// Tool calls requested by this message (empty when there are none).
    pub fn requested_tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// Function name plus arguments serialized as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// Tool catalogue entry sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            kind: function_type(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

fn function_type() -> String {
    "function".to_string()
}

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// The assistant turn returned by one model call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: Option<MessageContent>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    /// A text-only reply.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(MessageContent::Text(content.into())),
            finish_reason: Some("stop".to_string()),
            ..Default::default()
        }
    }

    /// A reply that only requests tool calls.
    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            finish_reason: Some("tool_calls".to_string()),
            ..Default::default()
        }
    }

    /// Convert into the assistant message appended to the transcript.
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            role: Role::Assistant,
            content: self.content,
            tool_calls: self.tool_calls,
            tool_call_id: None,
        }
    }
}

/// A chat-completions capable model endpoint.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Request the next assistant turn.
    ///
    /// When `tools` is given the model may pick tools on its own
    /// (`tool_choice = "auto"`).
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_content_joins_only_text() {
        let content: MessageContent = serde_json::from_value(json!([
            {"type": "text", "text": "Hello, "},
            {"type": "image_url", "image_url": {"url": "https://example.com/a.png"}},
            {"type": "text", "text": "world"}
        ]))
        .unwrap();

        assert_eq!(content.text(), "Hello, world");
    }

    #[test]
    fn non_text_parts_round_trip_unchanged() {
        let wire = json!({
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Looking up", "annotations": []},
                {"type": "refusal", "refusal": "I can't share that"}
            ]
        });

        let msg: ChatMessage = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(msg.text().as_deref(), Some("Looking up"));

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back, wire);
    }

    #[test]
    fn constructed_text_part_serializes_with_type() {
        let value = serde_json::to_value(ContentPart::text("hi")).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hi"}));
    }

    #[test]
    fn tool_result_serializes_call_id() {
        let msg = ChatMessage::tool_result("call_1", "done");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "done", "tool_call_id": "call_1"})
        );
    }

    #[test]
    fn assistant_tool_call_message_omits_missing_content() {
        let msg = ChatResponse::with_tool_calls(vec![ToolCall::new(
            "call_1",
            "search_users",
            r#"{"query":"John"}"#,
        )])
        .into_message();

        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("content").is_none());
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(value["tool_calls"][0]["function"]["name"], "search_users");
        assert_eq!(msg.requested_tool_calls().len(), 1);
    }

    #[test]
    fn tool_call_without_type_defaults_to_function() {
        let call: ToolCall = serde_json::from_value(json!({
            "id": "call_9",
            "function": {"name": "get_user_details", "arguments": "{}"}
        }))
        .unwrap();
        assert_eq!(call.kind, "function");
    }

    #[test]
    fn role_display_matches_wire_format() {
        assert_eq!(Role::Tool.to_string(), "tool");
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), json!("assistant"));
    }
}
