//! Client error types.

use compform_core::{FormError, ResponseParseError};
use thiserror::Error;

/// Error returned by a caller-supplied stream handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid client configuration. Raised at construction, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting is out of range or malformed.
    #[error("invalid setting '{field}': {reason}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// The HTTP transport could not be built from the settings.
    #[error("failed to build HTTP transport: {0}")]
    Transport(String),

    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while running a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The form could not produce a request (missing or unknown keys).
    #[error(transparent)]
    Form(#[from] FormError),

    /// The API answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnosis.
        body: String,
    },

    /// The API could not be reached.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// The request failed in flight.
    #[error("request failed: {0}")]
    Transport(String),

    /// The per-call timeout fired.
    #[error("request timed out")]
    Timeout,

    /// The API answered with a body that does not have the expected shape.
    #[error("malformed API response: {message}")]
    Decode {
        /// What was wrong.
        message: String,
        /// The body as received.
        raw: String,
    },

    /// The event stream broke off or carried a malformed event.
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// The caller's stream handler failed.
    #[error("stream handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// The model's reply could not be parsed against the response schema.
    #[error(transparent)]
    Parse(#[from] ResponseParseError),

    /// Every attempt failed. The last failure is the error source.
    #[error("completion failed after {attempts} attempts; last error: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// The final attempt's failure.
        #[source]
        last: Box<CompletionError>,
    },
}

impl CompletionError {
    /// Whether a fresh attempt could succeed where this one failed.
    ///
    /// Input errors and an exhausted retry loop are final; every failure of
    /// a single delivery attempt is worth another try.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Form(_) | Self::RetriesExhausted { .. })
    }

    /// The raw model or API output attached to this error, if any.
    #[must_use]
    pub fn raw_content(&self) -> Option<&str> {
        match self {
            Self::Parse(e) => Some(&e.raw),
            Self::Decode { raw, .. } => Some(raw),
            Self::RetriesExhausted { last, .. } => last.raw_content(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CompletionError::Timeout
        } else if err.is_connect() {
            CompletionError::Unavailable(err.to_string())
        } else {
            CompletionError::Transport(err.to_string())
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, CompletionError>;
