//! Delivery of chat requests to the completion API.
//!
//! [`Transport`] is the seam between the retry loop and the network.
//! [`HttpTransport`] talks to any OpenAI-compatible server over `reqwest`;
//! tests swap in scripted implementations.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::debug;

use crate::error::{CompletionError, ConfigError, Result};
use crate::settings::ClientSettings;
use crate::stream::{self, DeltaStream};
use crate::types::{ChatRequest, ChatResponse};

/// One delivery attempt, standard or streaming.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and read the full response.
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Send a request and return its text deltas as they arrive.
    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream>;
}

/// `reqwest`-backed transport for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    url: String,
}

impl HttpTransport {
    /// Build an HTTP client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Transport`] if the API key is not a valid
    /// header value or the TLS backend cannot be initialised.
    pub fn new(settings: &ClientSettings) -> std::result::Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = settings.api_key() {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| ConfigError::Transport(format!("invalid API key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ConfigError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: settings.url(),
        })
    }

    /// Endpoint every request is posted to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        debug!(url = %self.url, stream = request.stream, messages = request.messages.len(), "posting chat request");
        let response = self.http.post(&self.url).json(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CompletionError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = self.post(request).await?.text().await?;
        match serde_json::from_str::<ChatResponse>(&body) {
            Ok(response) => Ok(response),
            Err(e) => Err(CompletionError::Decode {
                message: e.to_string(),
                raw: body,
            }),
        }
    }

    async fn stream(&self, request: &ChatRequest) -> Result<DeltaStream> {
        let response = self.post(request).await?;
        Ok(stream::from_response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_endpoint() {
        let settings = ClientSettings::builder("m")
            .with_base_url("http://localhost:8080/v1/")
            .build()
            .expect("settings");
        let transport = HttpTransport::new(&settings).expect("transport");
        assert_eq!(transport.url(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn rejects_unprintable_api_key() {
        let settings = ClientSettings::builder("m")
            .with_api_key("bad\nkey")
            .build()
            .expect("settings");
        let err = HttpTransport::new(&settings).expect_err("header value");
        assert!(matches!(err, ConfigError::Transport(_)));
    }
}
