//! The completion form: a validated, fillable prompt template.
//!
//! A template maps roles to message text with `{placeholder}` tokens, plus a
//! reserved `response` role describing the reply:
//!
//! ```json
//! {
//!   "system": "You are a helpful assistant.",
//!   "user": "Hello, my name is {name} and I live in {city}.",
//!   "response": {
//!     "greeting": { "type": "string", "description": "A welcome message." }
//!   }
//! }
//! ```
//!
//! All structural checks run once, in the constructor. Filling and message
//! building only ever fail on caller input.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{FormError, Result, ResponseParseError};
use crate::placeholder::MessageTemplate;
use crate::request::{CompletionRequest, Message, ParsedResponse, ResponseParser};
use crate::schema::{ResponseFormat, ResponseSchema, THINKING_KEY};

/// Role holding the response schema.
pub const RESPONSE_ROLE: &str = "response";

/// Role every template must declare.
pub const USER_ROLE: &str = "user";

/// A validated template plus the data filled into it so far.
///
/// # Example
///
/// ```
/// use compform_core::Form;
/// use serde_json::json;
///
/// let mut form = Form::from_value(&json!({
///     "user": "Summarize: {text}",
///     "response": { "summary": { "type": "text" } }
/// }))?;
/// form.put("text", "Rust is a systems language.")?;
/// let messages = form.messages()?;
/// assert_eq!(messages[0].content, "Summarize: Rust is a systems language.");
/// assert!(form.response_format().is_none());
/// # Ok::<(), compform_core::FormError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Form {
    roles: Vec<(String, MessageTemplate)>,
    response: ResponseSchema,
    keys: Vec<String>,
    data: HashMap<String, String>,
}

impl Form {
    /// Build a form from an in-memory template mapping.
    ///
    /// # Errors
    ///
    /// [`FormError::ReservedKey`] if `thinking` is used as a role or as a
    /// response field; [`FormError::InvalidTemplate`] for every other
    /// structural problem.
    pub fn from_value(template: &Value) -> Result<Self> {
        let Value::Object(entries) = template else {
            return Err(FormError::InvalidTemplate("template must be a non-empty mapping".into()));
        };
        if entries.is_empty() {
            return Err(FormError::InvalidTemplate("template must be a non-empty mapping".into()));
        }

        if entries.contains_key(THINKING_KEY) {
            return Err(FormError::ReservedKey(format!(
                "'{THINKING_KEY}' is reserved and cannot be a role"
            )));
        }
        let reserved_in_response = entries
            .get(RESPONSE_ROLE)
            .and_then(Value::as_object)
            .is_some_and(|fields| fields.contains_key(THINKING_KEY));
        if reserved_in_response {
            return Err(FormError::ReservedKey(format!(
                "'{THINKING_KEY}' is reserved in the response schema"
            )));
        }

        for required in [USER_ROLE, RESPONSE_ROLE] {
            if !entries.contains_key(required) {
                return Err(FormError::InvalidTemplate(format!(
                    "template must include a '{required}' role"
                )));
            }
        }

        let mut roles = Vec::with_capacity(entries.len() - 1);
        let mut keys: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut response = None;

        for (role, content) in entries {
            if role.is_empty() {
                return Err(FormError::InvalidTemplate("roles must be non-empty strings".into()));
            }
            if role == RESPONSE_ROLE {
                response = Some(ResponseSchema::from_value(content)?);
                continue;
            }
            let Value::String(text) = content else {
                return Err(FormError::InvalidTemplate(format!(
                    "content for role '{role}' must be a string"
                )));
            };

            let message = MessageTemplate::parse(role, text)?;
            for field in message.fields() {
                if seen.insert(field.to_string()) {
                    keys.push(field.to_string());
                }
            }
            roles.push((role.clone(), message));
        }

        let Some(response) = response else {
            return Err(FormError::InvalidTemplate(format!(
                "template must include a '{RESPONSE_ROLE}' role"
            )));
        };

        debug!(
            roles = roles.len(),
            placeholders = keys.len(),
            text_response = response.is_text(),
            "completion form parsed"
        );

        Ok(Self {
            roles,
            response,
            keys,
            data: HashMap::new(),
        })
    }

    /// Build a form from a JSON document.
    ///
    /// # Errors
    ///
    /// As [`Form::from_value`], plus [`FormError::InvalidTemplate`] when the
    /// text is not JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| FormError::InvalidTemplate(format!("template is not valid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Load a form from a JSON file.
    ///
    /// # Errors
    ///
    /// [`FormError::FileNotFound`] when the path does not exist,
    /// [`FormError::InvalidJson`] when it holds malformed JSON, otherwise as
    /// [`Form::from_value`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_template(path)?;
        let value: Value = serde_json::from_str(&content).map_err(|e| FormError::InvalidJson {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_value(&value)
    }

    /// Load a form from a TOML file with the same shape as the JSON template.
    ///
    /// # Errors
    ///
    /// [`FormError::FileNotFound`] when the path does not exist,
    /// [`FormError::InvalidToml`] when it holds malformed TOML, otherwise as
    /// [`Form::from_value`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = read_template(path)?;
        let value: Value = toml::from_str(&content).map_err(|e| FormError::InvalidToml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_value(&value)
    }

    /// Placeholder names in first-appearance order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Set the value of one placeholder. Setting a key twice overwrites it.
    ///
    /// # Errors
    ///
    /// [`FormError::InvalidKey`] if the key is empty or not a placeholder of
    /// this template.
    pub fn put(&mut self, key: &str, value: impl Into<String>) -> Result<&mut Self> {
        if key.is_empty() || !self.keys.iter().any(|k| k == key) {
            return Err(FormError::InvalidKey {
                key: key.to_string(),
                valid: self.keys.clone(),
            });
        }
        self.data.insert(key.to_string(), value.into());
        Ok(self)
    }

    /// Set a placeholder from a dynamic JSON value, which must be a string.
    ///
    /// # Errors
    ///
    /// [`FormError::InvalidValue`] for non-string values, otherwise as [`Form::put`].
    pub fn put_value(&mut self, key: &str, value: &Value) -> Result<&mut Self> {
        let Value::String(text) = value else {
            return Err(FormError::InvalidValue {
                key: key.to_string(),
                reason: format!("value must be a string, got {value}"),
            });
        };
        self.put(key, text.as_str())
    }

    /// Fill several placeholders from a JSON object.
    ///
    /// # Errors
    ///
    /// Stops at the first entry [`Form::put_value`] rejects.
    pub fn fill_from(&mut self, values: &Map<String, Value>) -> Result<&mut Self> {
        for (key, value) in values {
            self.put_value(key, value)?;
        }
        Ok(self)
    }

    /// Drop all filled data so the form can be reused.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Build the wire messages, one per non-response role, in template order.
    ///
    /// # Errors
    ///
    /// [`FormError::Validation`] naming every missing and every unexpected
    /// key unless the filled keys equal the placeholder set exactly.
    pub fn messages(&self) -> Result<Vec<Message>> {
        self.validate_data()?;
        self.roles
            .iter()
            .map(|(role, template)| {
                let content = template.render(&self.data).map_err(|missing| FormError::Validation {
                    missing: vec![missing.to_string()],
                    extra: Vec::new(),
                })?;
                Ok(Message::new(role.clone(), content.trim()))
            })
            .collect()
    }

    /// The `response_format` contract, or `None` when the reply is free text.
    #[must_use]
    pub fn response_format(&self) -> Option<ResponseFormat> {
        self.response.response_format()
    }

    /// The `response` role exactly as written.
    #[must_use]
    pub fn response_schema(&self) -> &Value {
        self.response.raw()
    }

    /// Raw message templates as `(role, template)` pairs, in template order.
    #[must_use]
    pub fn messages_schema(&self) -> Vec<(&str, &str)> {
        self.roles
            .iter()
            .map(|(role, template)| (role.as_str(), template.source()))
            .collect()
    }

    /// Parse a raw model reply according to the response schema.
    ///
    /// # Errors
    ///
    /// See [`ResponseParser::parse`].
    pub fn parse_response(&self, raw: &str) -> std::result::Result<ParsedResponse, ResponseParseError> {
        ResponseParser::for_schema(&self.response).parse(raw)
    }

    /// Snapshot the filled form into a self-contained request.
    ///
    /// # Errors
    ///
    /// As [`Form::messages`].
    pub fn create_request(&self) -> Result<CompletionRequest> {
        let messages = self.messages()?;
        Ok(CompletionRequest::new(
            messages,
            self.response_format(),
            ResponseParser::for_schema(&self.response),
        ))
    }

    /// Human-readable view of the raw templates (`raw = true`) or of the
    /// filled messages.
    ///
    /// # Errors
    ///
    /// As [`Form::messages`] when `raw` is false.
    pub fn preview_messages(&self, raw: bool) -> Result<String> {
        let mut out = String::new();
        if raw {
            out.push_str("--- Raw Messages ---\n");
            for (role, template) in self.messages_schema() {
                let _ = write!(out, "[{}]\n{template}\n\n", capitalize(role));
            }
        } else {
            let messages = self.messages()?;
            out.push_str("--- Formatted Messages ---\n");
            for message in messages {
                let _ = write!(out, "[{}]\n{}\n\n", capitalize(&message.role), message.content);
            }
        }
        Ok(out)
    }

    /// Human-readable view of the response contract, falling back to the
    /// raw response schema for free-text replies.
    #[must_use]
    pub fn preview_response_format(&self) -> String {
        let body = match self.response_format() {
            Some(format) => serde_json::to_string_pretty(&format),
            None => serde_json::to_string_pretty(self.response_schema()),
        }
        .unwrap_or_default();
        format!("--- Response Format ---\n{body}\n")
    }

    fn validate_data(&self) -> Result<()> {
        let mut missing: Vec<String> = self
            .keys
            .iter()
            .filter(|k| !self.data.contains_key(*k))
            .cloned()
            .collect();
        let mut extra: Vec<String> = self
            .data
            .keys()
            .filter(|k| !self.keys.contains(*k))
            .cloned()
            .collect();
        if missing.is_empty() && extra.is_empty() {
            return Ok(());
        }
        missing.sort();
        extra.sort();
        Err(FormError::Validation { missing, extra })
    }
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FormError::FileNotFound(path.to_path_buf()),
        _ => FormError::Io(e),
    })
}

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
