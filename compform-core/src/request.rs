//! Ready-to-send completion requests.
//!
//! A [`CompletionRequest`] is an immutable snapshot taken from a filled
//! [`Form`](crate::Form): the messages to send, the response contract, and
//! the parser needed to read the reply. A client can send and parse it
//! without touching the form again.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResponseParseError;
use crate::schema::{ResponseFormat, ResponseSchema, THINKING_KEY};

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>(.*)").expect("think pattern is valid"));

/// Mapping produced from a model reply.
pub type ParsedResponse = Map<String, Value>;

/// One chat message on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role such as `system` or `user`.
    pub role: String,
    /// Fully substituted, trimmed content.
    pub content: String,
}

impl Message {
    /// Create a message.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// How a raw reply turns into a [`ParsedResponse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseParser {
    /// Free text bound to one field, with an optional `<think>` block split off.
    Text {
        /// Field the reply text is stored under.
        field: String,
    },
    /// The reply is a JSON object returned as-is.
    Structured,
}

impl ResponseParser {
    /// Pick the parser matching a response schema.
    #[must_use]
    pub fn for_schema(schema: &ResponseSchema) -> Self {
        if schema.is_text() {
            Self::Text {
                field: schema.text_field().unwrap_or_default().to_string(),
            }
        } else {
            Self::Structured
        }
    }

    /// Parse a raw reply.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseParseError`] when a structured reply is not a JSON
    /// object, or when a text parser has no field to bind to.
    pub fn parse(&self, raw: &str) -> Result<ParsedResponse, ResponseParseError> {
        match self {
            Self::Text { field } => parse_text(field, raw),
            Self::Structured => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(ResponseParseError::new(
                    format!("expected a JSON object, got {}", json_kind(&other)),
                    raw,
                )),
                Err(e) => Err(ResponseParseError::new(
                    format!("failed to decode JSON response: {e}"),
                    raw,
                )),
            },
        }
    }
}

fn parse_text(field: &str, raw: &str) -> Result<ParsedResponse, ResponseParseError> {
    if field.is_empty() {
        return Err(ResponseParseError::new("text response template has no field", raw));
    }

    let mut parsed = Map::new();
    match THINK_BLOCK.captures(raw) {
        Some(caps) => {
            let thinking = caps.get(1).map_or("", |m| m.as_str()).trim();
            let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
            parsed.insert(THINKING_KEY.into(), Value::String(thinking.into()));
            parsed.insert(field.into(), Value::String(rest.into()));
        }
        None => {
            parsed.insert(field.into(), Value::String(raw.trim().into()));
        }
    }
    Ok(parsed)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Immutable bundle of everything needed to send one completion and read it back.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    messages: Vec<Message>,
    response_format: Option<ResponseFormat>,
    parser: ResponseParser,
}

impl CompletionRequest {
    /// Assemble a request from parts.
    #[must_use]
    pub fn new(messages: Vec<Message>, response_format: Option<ResponseFormat>, parser: ResponseParser) -> Self {
        Self {
            messages,
            response_format,
            parser,
        }
    }

    /// Messages in template declaration order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Response contract, or `None` for free-text replies.
    #[must_use]
    pub fn response_format(&self) -> Option<&ResponseFormat> {
        self.response_format.as_ref()
    }

    /// Whether the reply is expected as free text.
    #[must_use]
    pub fn is_text_response(&self) -> bool {
        matches!(self.parser, ResponseParser::Text { .. })
    }

    /// Parse a raw reply the same way the originating form would.
    ///
    /// # Errors
    ///
    /// See [`ResponseParser::parse`].
    pub fn parse(&self, raw: &str) -> Result<ParsedResponse, ResponseParseError> {
        self.parser.parse(raw)
    }

    /// Parse a raw reply and deserialize the mapping into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseParseError`] if parsing fails or the mapping does not fit `T`.
    pub fn parse_into<T: DeserializeOwned>(&self, raw: &str) -> Result<T, ResponseParseError> {
        let parsed = self.parse(raw)?;
        serde_json::from_value(Value::Object(parsed))
            .map_err(|e| ResponseParseError::new(format!("response does not match the expected type: {e}"), raw))
    }
}
