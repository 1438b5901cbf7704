//! Upstream completion providers
//!
//! This module defines the seam between a session and the service that
//! generates text, plus the OpenAI-compatible implementation used in production.

pub mod adapter;
pub mod openai;

pub use adapter::{ByteStream, CompletionProvider};
pub use openai::{CompletionRequestBuilder, OpenAIProvider, StreamDecoder, StreamEvent};
