//! # compform-core: Declarative Completion Forms
//!
//! A *form* is a reusable prompt template for a chat-completion API:
//!
//! - message roles with `{placeholder}` tokens, filled at runtime
//! - a `response` schema built from a small, closed set of node types
//! - a JSON-schema `response_format` contract derived from that schema
//! - deterministic parsing of the raw model reply back into a mapping
//!
//! ```text
//! template ──► Form ──put()──► create_request() ──► CompletionRequest
//!                                                      │ messages
//!                                                      │ response_format
//!                                                      └ parse(raw) ──► mapping
//! ```
//!
//! Sending the request is the job of `compform-llm`.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod error;
pub mod form;
pub mod placeholder;
pub mod request;
pub mod schema;

pub use catalog::FormCatalog;
pub use error::{FormError, ResponseParseError};
pub use form::Form;
pub use request::{CompletionRequest, Message, ParsedResponse, ResponseParser};
pub use schema::{ResponseFormat, ResponseSchema, SchemaKind, SchemaNode, SchemaType};
