//! File-based configuration.
//!
//! Maps directly to a TOML file such as:
//!
//! ```toml
//! [client]
//! model = "gpt-4o-mini"
//! base_url = "http://localhost:11434/v1"
//! max_retries = 2
//! backoff_jitter = false
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::settings::{ClientSettings, ClientSettingsBuilder};

/// Top-level configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompletionConfig {
    /// Client settings, validated by [`CompletionConfig::settings`].
    #[serde(default)]
    pub client: ClientSettingsBuilder,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CompletionConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if the TOML is invalid or has unknown keys.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate the `[client]` table into settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for the first out-of-range field.
    pub fn settings(&self) -> Result<ClientSettings, ConfigError> {
        self.client.clone().build()
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive: trace, debug, info, warn, error, or a full
    /// `tracing` filter such as `compform_llm=debug`. `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
