//! Error types for the template engine.

use std::path::PathBuf;

use thiserror::Error;

/// A model reply that could not be turned into a result mapping.
///
/// The raw text is always kept so callers can log what the model produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}; raw content: '{raw}'")]
pub struct ResponseParseError {
    /// What went wrong.
    pub message: String,
    /// The reply exactly as received.
    pub raw: String,
}

impl ResponseParseError {
    /// Create a parse error for the given raw reply.
    pub fn new(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            raw: raw.into(),
        }
    }
}

/// Errors raised while loading, validating, filling, or reading back a form.
#[derive(Debug, Error)]
pub enum FormError {
    /// The template file does not exist.
    #[error("form file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The template file exists but is not valid JSON.
    #[error("invalid JSON in '{}': {message}", .path.display())]
    InvalidJson {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The template file exists but is not valid TOML.
    #[error("invalid TOML in '{}': {message}", .path.display())]
    InvalidToml {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A catalog directory holds no template files.
    #[error("no form templates found in directory: {}", .0.display())]
    EmptyCatalog(PathBuf),

    /// Generic I/O error while reading a template.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The template has a structural problem.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// A reserved name (`thinking`) was used as a role or response field.
    #[error("reserved key: {0}")]
    ReservedKey(String),

    /// A key that the template does not declare.
    #[error("invalid key '{key}'; valid keys are: {valid:?}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Placeholders the template declares, in order.
        valid: Vec<String>,
    },

    /// A value that cannot be used to fill a placeholder.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Placeholder the value was meant for.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Filled data does not match the placeholder set exactly.
    #[error("form validation failed; {}", describe_mismatch(.missing, .extra))]
    Validation {
        /// Declared placeholders with no value, sorted.
        missing: Vec<String>,
        /// Filled keys the template does not declare, sorted.
        extra: Vec<String>,
    },

    /// A model reply could not be parsed.
    #[error(transparent)]
    Parse(#[from] ResponseParseError),
}

fn describe_mismatch(missing: &[String], extra: &[String]) -> String {
    let mut parts = Vec::with_capacity(2);
    if !missing.is_empty() {
        parts.push(format!("missing keys: {missing:?}"));
    }
    if !extra.is_empty() {
        parts.push(format!("unexpected keys: {extra:?}"));
    }
    parts.join("; ")
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, FormError>;
