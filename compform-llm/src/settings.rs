//! Immutable client settings.
//!
//! [`ClientSettings`] can only be obtained through
//! [`ClientSettingsBuilder::build`], which checks every field, so an invalid
//! instance is never observable. The builder doubles as the `[client]` table
//! of a TOML configuration file.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How a structured response contract is sent to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuredOutput {
    /// Send the full computed JSON schema (`"type": "json_schema"`).
    #[default]
    JsonSchema,
    /// Only ask for a JSON object (`"type": "json_object"`), for servers
    /// without schema support.
    JsonObject,
}

/// Validated, immutable configuration for a completion client.
#[derive(Clone, PartialEq)]
pub struct ClientSettings {
    model: String,
    api_key: Option<String>,
    base_url: String,
    endpoint: String,
    max_retries: u32,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    timeout: Option<Duration>,
    backoff_base: f64,
    backoff_jitter: bool,
    structured_output: StructuredOutput,
}

impl ClientSettings {
    /// Start building settings for `model`, with every other field at its default.
    #[must_use]
    pub fn builder(model: impl Into<String>) -> ClientSettingsBuilder {
        ClientSettingsBuilder {
            model: model.into(),
            ..ClientSettingsBuilder::default()
        }
    }

    /// Model identifier.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Bearer token, if the server needs one.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// API base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat-completions path appended to the base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full chat-completions URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint)
    }

    /// Retries after the first attempt. Total attempts are `max_retries + 1`.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Sampling temperature.
    #[must_use]
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Completion token limit.
    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Nucleus sampling probability.
    #[must_use]
    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    /// Frequency penalty.
    #[must_use]
    pub fn frequency_penalty(&self) -> f32 {
        self.frequency_penalty
    }

    /// Presence penalty.
    #[must_use]
    pub fn presence_penalty(&self) -> f32 {
        self.presence_penalty
    }

    /// Per-call timeout; `None` when configured as zero.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Base of the exponential backoff, in seconds.
    #[must_use]
    pub fn backoff_base(&self) -> f64 {
        self.backoff_base
    }

    /// Whether up to one second of random jitter is added to each backoff.
    #[must_use]
    pub fn backoff_jitter(&self) -> bool {
        self.backoff_jitter
    }

    /// How structured contracts are sent.
    #[must_use]
    pub fn structured_output(&self) -> StructuredOutput {
        self.structured_output
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("endpoint", &self.endpoint)
            .field("max_retries", &self.max_retries)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_p", &self.top_p)
            .field("frequency_penalty", &self.frequency_penalty)
            .field("presence_penalty", &self.presence_penalty)
            .field("timeout", &self.timeout)
            .field("backoff_base", &self.backoff_base)
            .field("backoff_jitter", &self.backoff_jitter)
            .field("structured_output", &self.structured_output)
            .finish()
    }
}

/// Unvalidated settings. Call [`build`](Self::build) to check them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSettingsBuilder {
    /// Model identifier (required).
    #[serde(default)]
    pub model: String,
    /// Bearer token; leave unset for local servers.
    #[serde(default)]
    pub api_key: Option<String>,
    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Chat-completions path.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Sampling temperature, `[0, 2]`.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token limit, `> 0`.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Nucleus sampling probability, `[0, 1]`.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Frequency penalty, `[-2, 2]`.
    #[serde(default)]
    pub frequency_penalty: f32,
    /// Presence penalty, `[-2, 2]`.
    #[serde(default)]
    pub presence_penalty: f32,
    /// Per-call timeout in seconds, `>= 0`; zero disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    /// Backoff base in seconds, `>= 1`.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,
    /// Add `[0, 1)` seconds of random jitter to each backoff.
    #[serde(default = "default_true")]
    pub backoff_jitter: bool,
    /// How structured contracts are sent.
    #[serde(default)]
    pub structured_output: StructuredOutput,
}

impl Default for ClientSettingsBuilder {
    fn default() -> Self {
        Self {
            model: String::new(),
            api_key: None,
            base_url: default_base_url(),
            endpoint: default_endpoint(),
            max_retries: default_max_retries(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            timeout_secs: default_timeout_secs(),
            backoff_base: default_backoff_base(),
            backoff_jitter: true,
            structured_output: StructuredOutput::default(),
        }
    }
}

impl ClientSettingsBuilder {
    /// Set the bearer token.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the chat-completions path.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the number of retries after the first attempt.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the completion token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the nucleus sampling probability.
    #[must_use]
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the frequency penalty.
    #[must_use]
    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = penalty;
        self
    }

    /// Set the presence penalty.
    #[must_use]
    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = penalty;
        self
    }

    /// Set the per-call timeout in seconds (zero disables it).
    #[must_use]
    pub fn with_timeout_secs(mut self, timeout_secs: f64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the backoff base and jitter flag.
    #[must_use]
    pub fn with_backoff(mut self, base: f64, jitter: bool) -> Self {
        self.backoff_base = base;
        self.backoff_jitter = jitter;
        self
    }

    /// Choose how structured contracts are sent.
    #[must_use]
    pub fn with_structured_output(mut self, mode: StructuredOutput) -> Self {
        self.structured_output = mode;
        self
    }

    /// Validate every field and freeze the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first field out of range.
    pub fn build(self) -> Result<ClientSettings, ConfigError> {
        if self.model.trim().is_empty() {
            return Err(invalid("model", "must be a non-empty string"));
        }
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must be a non-empty string"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(invalid("endpoint", "must be a non-empty string"));
        }
        if self.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
            return Err(invalid("api_key", "must not be blank when provided"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature", "must be between 0.0 and 2.0"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", "must be a positive integer"));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(invalid("top_p", "must be between 0.0 and 1.0"));
        }
        if !(-2.0..=2.0).contains(&self.frequency_penalty) {
            return Err(invalid("frequency_penalty", "must be between -2.0 and 2.0"));
        }
        if !(-2.0..=2.0).contains(&self.presence_penalty) {
            return Err(invalid("presence_penalty", "must be between -2.0 and 2.0"));
        }
        let timeout = match Duration::try_from_secs_f64(self.timeout_secs) {
            Ok(d) if d.is_zero() => None,
            Ok(d) => Some(d),
            Err(_) => return Err(invalid("timeout_secs", "must be a non-negative number of seconds")),
        };
        if !(self.backoff_base >= 1.0 && self.backoff_base.is_finite()) {
            return Err(invalid("backoff_base", "must be a finite number >= 1.0"));
        }

        Ok(ClientSettings {
            model: self.model,
            api_key: self.api_key,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            endpoint: self.endpoint,
            max_retries: self.max_retries,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
            timeout,
            backoff_base: self.backoff_base,
            backoff_jitter: self.backoff_jitter,
            structured_output: self.structured_output,
        })
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_endpoint() -> String { "/chat/completions".to_string() }
fn default_max_retries() -> u32 { 3 }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 1024 }
fn default_top_p() -> f32 { 1.0 }
fn default_timeout_secs() -> f64 { 60.0 }
fn default_backoff_base() -> f64 { 2.0 }
