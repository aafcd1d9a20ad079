//! Wire types for the OpenAI-compatible chat-completions API.

use compform_core::Message;
use compform_core::schema::JsonSchemaFormat;
use serde::{Deserialize, Serialize};

/// Body of a chat-completions request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation in template order.
    pub messages: Vec<Message>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Nucleus sampling probability.
    pub top_p: f32,
    /// Frequency penalty.
    pub frequency_penalty: f32,
    /// Presence penalty.
    pub presence_penalty: f32,
    /// Whether the reply is delivered as server-sent events.
    pub stream: bool,
    /// Forces a single JSON object reply when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<RequestFormat>,
}

/// The `response_format` field of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestFormat {
    /// Reply must conform to the given schema.
    JsonSchema {
        /// Named schema.
        json_schema: JsonSchemaFormat,
    },
    /// Reply must be a JSON object.
    JsonObject,
}

/// Body of a non-streaming chat-completions response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Completion choices; only the first is used.
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Token accounting, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Text of the first choice, if any.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.message.content.as_deref())
    }
}

/// One completion choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Choice {
    /// The assistant message.
    pub message: AssistantMessage,
}

/// Assistant message inside a [`Choice`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Reply text.
    #[serde(default)]
    pub content: Option<String>,
}

/// Token accounting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u32,
    /// Sum of both.
    #[serde(default)]
    pub total_tokens: u32,
}

/// One server-sent event payload of a streaming response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChunk {
    /// Delta choices; only the first is used.
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

impl StreamChunk {
    /// Text delta of the first choice; empty when absent.
    #[must_use]
    pub fn delta_text(&self) -> &str {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .unwrap_or_default()
    }
}

/// One streamed choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChoice {
    /// Incremental content.
    #[serde(default)]
    pub delta: Delta,
}

/// Incremental content of a streamed choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    /// Text fragment, possibly empty.
    #[serde(default)]
    pub content: Option<String>,
}
