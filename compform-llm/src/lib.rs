//! # compform-llm: Resilient Completion Client
//!
//! Sends [`compform_core::CompletionRequest`]s to an OpenAI-compatible
//! chat-completions endpoint and parses the replies.
//!
//! - **Settings**: immutable, validated up front ([`ClientSettings`])
//! - **Delivery**: standard or server-sent-event streaming ([`Transport`])
//! - **Retry**: bounded loop with exponential backoff and optional jitter
//! - **Config**: TOML file with `[client]` and `[logging]` tables
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use compform_core::Form;
//! use compform_llm::{ClientSettings, CompletionClient};
//!
//! let mut form = Form::from_toml_file("forms/haiku.toml")?;
//! form.put("topic", "autumn")?;
//!
//! let settings = ClientSettings::builder("gpt-4o-mini").with_api_key("sk-...").build()?;
//! let client = CompletionClient::new(settings)?;
//! let reply = client.complete_form(&form).await?;
//! println!("{reply:?}");
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod settings;
pub mod stream;
pub mod transport;
pub mod types;

pub use backoff::{RetryPolicy, Sleeper, TokioSleeper};
pub use client::CompletionClient;
pub use config::{CompletionConfig, LoggingConfig};
pub use error::{CompletionError, ConfigError, HandlerError};
pub use logging::init_tracing;
pub use settings::{ClientSettings, ClientSettingsBuilder, StructuredOutput};
pub use stream::{DeltaStream, SseDecoder};
pub use transport::{HttpTransport, Transport};
pub use types::{ChatRequest, ChatResponse, RequestFormat};
