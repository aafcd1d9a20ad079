//! Completion client: payload construction, delivery, retry with backoff.
//!
//! Every call runs a bounded attempt loop:
//!
//! ```text
//! ATTEMPT ──ok──► parsed mapping
//!    │ failed
//!    ├─ budget left ──► sleep(base^attempt [+ jitter]) ──► ATTEMPT
//!    └─ exhausted  ──► CompletionError::RetriesExhausted { last }
//! ```
//!
//! A streaming attempt that breaks off is a failed attempt; the next attempt
//! starts the request and the stream from zero. Dropping the returned future
//! cancels the call, including a pending backoff wait.

use std::sync::Arc;

use compform_core::{CompletionRequest, Form, ParsedResponse, ResponseParseError};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backoff::{RetryPolicy, Sleeper, TokioSleeper};
use crate::error::{CompletionError, ConfigError, HandlerError, Result};
use crate::settings::{ClientSettings, StructuredOutput};
use crate::transport::{HttpTransport, Transport};
use crate::types::{ChatRequest, RequestFormat};

type DeltaHandler<'h> = &'h mut (dyn FnMut(&str) -> std::result::Result<(), HandlerError> + Send);

/// Resilient chat-completion client.
///
/// Holds only read-only state, so one client can serve concurrent calls.
#[derive(Clone)]
pub struct CompletionClient {
    settings: ClientSettings,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionClient")
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CompletionClient {
    /// Create a client that talks HTTP to `settings.url()`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Transport`] if the HTTP client cannot be built.
    pub fn new(settings: ClientSettings) -> std::result::Result<Self, ConfigError> {
        let transport = HttpTransport::new(&settings)?;
        Ok(Self::with_transport(settings, Arc::new(transport)))
    }

    /// Create a client over a custom transport.
    #[must_use]
    pub fn with_transport(settings: ClientSettings, transport: Arc<dyn Transport>) -> Self {
        let policy = RetryPolicy::from_settings(&settings);
        Self {
            settings,
            transport,
            sleeper: Arc::new(TokioSleeper),
            policy,
        }
    }

    /// Replace the backoff timer.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// The validated settings this client was built with.
    #[must_use]
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// The retry policy derived from the settings.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Wire payload for one attempt.
    #[must_use]
    pub fn build_payload(&self, request: &CompletionRequest, stream: bool) -> ChatRequest {
        let response_format = request.response_format().map(|format| match self.settings.structured_output() {
            StructuredOutput::JsonSchema => RequestFormat::JsonSchema {
                json_schema: format.json_schema.clone(),
            },
            StructuredOutput::JsonObject => RequestFormat::JsonObject,
        });

        ChatRequest {
            model: self.settings.model().to_string(),
            messages: request.messages().to_vec(),
            temperature: self.settings.temperature(),
            max_tokens: self.settings.max_tokens(),
            top_p: self.settings.top_p(),
            frequency_penalty: self.settings.frequency_penalty(),
            presence_penalty: self.settings.presence_penalty(),
            stream,
            response_format,
        }
    }

    /// Send `request` and parse the full reply.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::RetriesExhausted`] carrying the last
    /// failure once every attempt has failed.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<ParsedResponse> {
        self.run(request, None).await
    }

    /// Stream `request`, calling `handler` with every text delta in arrival
    /// order, then parse the joined text.
    ///
    /// A handler error fails the attempt. A retried attempt replays the
    /// stream from its first delta.
    ///
    /// # Errors
    ///
    /// As [`CompletionClient::complete`].
    pub async fn complete_streaming<H>(&self, request: &CompletionRequest, mut handler: H) -> Result<ParsedResponse>
    where
        H: FnMut(&str) -> std::result::Result<(), HandlerError> + Send,
    {
        self.run(request, Some(&mut handler)).await
    }

    /// Build a request from a filled form and complete it.
    ///
    /// # Errors
    ///
    /// [`CompletionError::Form`] without any attempt if the form's data does
    /// not match its placeholders; otherwise as [`CompletionClient::complete`].
    pub async fn complete_form(&self, form: &Form) -> Result<ParsedResponse> {
        let request = form.create_request()?;
        self.complete(&request).await
    }

    /// Streaming counterpart of [`CompletionClient::complete_form`].
    ///
    /// # Errors
    ///
    /// As [`CompletionClient::complete_form`].
    pub async fn complete_form_streaming<H>(&self, form: &Form, handler: H) -> Result<ParsedResponse>
    where
        H: FnMut(&str) -> std::result::Result<(), HandlerError> + Send,
    {
        let request = form.create_request()?;
        self.complete_streaming(&request, handler).await
    }

    /// Complete `request` and deserialize the mapping into `T`.
    ///
    /// # Errors
    ///
    /// As [`CompletionClient::complete`], plus [`CompletionError::Parse`] if
    /// the mapping does not fit `T`.
    pub async fn complete_as<T: DeserializeOwned>(&self, request: &CompletionRequest) -> Result<T> {
        let parsed = self.complete(request).await?;
        let value = Value::Object(parsed);
        serde_json::from_value(value.clone()).map_err(|e| {
            CompletionError::Parse(ResponseParseError::new(
                format!("response does not match the expected type: {e}"),
                value.to_string(),
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Attempt loop
    // -----------------------------------------------------------------------

    async fn run(&self, request: &CompletionRequest, mut handler: Option<DeltaHandler<'_>>) -> Result<ParsedResponse> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0u32;
        loop {
            let outcome = match handler.as_deref_mut() {
                Some(h) => self.attempt_streaming(request, h).await,
                None => self.attempt_standard(request).await,
            };

            let error = match outcome {
                Ok(parsed) => {
                    debug!(attempt = attempt + 1, max_attempts, fields = parsed.len(), "completion succeeded");
                    return Ok(parsed);
                }
                Err(error) => error,
            };

            warn!(attempt = attempt + 1, max_attempts, error = %error, "completion attempt failed");
            if !error.is_retryable() {
                return Err(error);
            }
            if !self.policy.should_retry(attempt) {
                return Err(CompletionError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.next_delay(attempt);
            warn!(
                attempt = attempt + 1,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying after backoff"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt_standard(&self, request: &CompletionRequest) -> Result<ParsedResponse> {
        let payload = self.build_payload(request, false);
        let response = self.transport.send(&payload).await?;
        let Some(content) = response.content() else {
            return Err(CompletionError::Decode {
                message: "response has no choices[0].message.content".into(),
                raw: serde_json::to_string(&response).unwrap_or_default(),
            });
        };
        Ok(request.parse(content)?)
    }

    async fn attempt_streaming(
        &self,
        request: &CompletionRequest,
        handler: &mut (dyn FnMut(&str) -> std::result::Result<(), HandlerError> + Send),
    ) -> Result<ParsedResponse> {
        let payload = self.build_payload(request, true);
        let mut deltas = self.transport.stream(&payload).await?;
        let mut text = String::new();
        while let Some(delta) = deltas.next().await {
            let delta = delta?;
            handler(&delta).map_err(CompletionError::Handler)?;
            text.push_str(&delta);
        }
        Ok(request.parse(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::stream::DeltaStream;
    use crate::types::ChatResponse;

    struct Unreachable;

    #[async_trait::async_trait]
    impl Transport for Unreachable {
        async fn send(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            Err(CompletionError::Unavailable("offline".into()))
        }

        async fn stream(&self, _request: &ChatRequest) -> Result<DeltaStream> {
            Err(CompletionError::Unavailable("offline".into()))
        }
    }

    fn structured_form() -> Form {
        Form::from_value(&json!({
            "system": "You rate {item}.",
            "response": { "score": { "type": "integer", "description": "1 to 5" } }
        }))
        .expect("valid form")
    }

    fn client(mode: StructuredOutput) -> CompletionClient {
        let settings = ClientSettings::builder("test-model")
            .with_temperature(0.2)
            .with_max_tokens(64)
            .with_structured_output(mode)
            .build()
            .expect("settings");
        CompletionClient::with_transport(settings, Arc::new(Unreachable))
    }

    #[test]
    fn payload_carries_settings_and_schema() {
        let mut form = structured_form();
        form.put("item", "tea").expect("declared key");
        let request = form.create_request().expect("request");

        let payload = client(StructuredOutput::JsonSchema).build_payload(&request, true);
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(value["model"], "test-model");
        assert_eq!(value["max_tokens"], 64);
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "You rate tea.");
        assert_eq!(value["response_format"]["type"], "json_schema");
        assert_eq!(value["response_format"]["json_schema"]["name"], "response");
        assert_eq!(
            value["response_format"]["json_schema"]["schema"]["required"],
            json!(["score"])
        );
    }

    #[test]
    fn json_object_mode() {
        let mut form = structured_form();
        form.put("item", "tea").expect("declared key");
        let request = form.create_request().expect("request");
        let payload = client(StructuredOutput::JsonObject).build_payload(&request, false);
        assert_eq!(payload.response_format, Some(RequestFormat::JsonObject));
    }

    #[test]
    fn text_form_sends_no_response_format() {
        let form = Form::from_value(&json!({
            "user": "Say hi",
            "response": { "reply": { "type": "text" } }
        }))
        .expect("valid form");
        let request = form.create_request().expect("request");
        let payload = client(StructuredOutput::JsonSchema).build_payload(&request, false);
        assert!(payload.response_format.is_none());
    }

    #[tokio::test]
    async fn zero_retries_fails_after_one_attempt() {
        let settings = ClientSettings::builder("m").with_max_retries(0).build().expect("settings");
        let client = CompletionClient::with_transport(settings, Arc::new(Unreachable));
        let mut form = structured_form();
        form.put("item", "tea").expect("declared key");

        match client.complete_form(&form).await {
            Err(CompletionError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 1);
                assert!(matches!(*last, CompletionError::Unavailable(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }
}
