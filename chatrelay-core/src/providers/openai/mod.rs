//! OpenAI provider implementation
//!
//! This module covers the OpenAI chat completions protocol: request building,
//! the wire format, the streaming body decoder and the HTTP-backed provider.
//! Any server speaking the same protocol (llama.cpp, vLLM, ...) works through
//! a different `base_url`.

mod client;
pub mod converter;
pub mod streaming;
pub mod types;

pub use client::{OpenAIProvider, DEFAULT_BASE_URL};
pub use converter::{build_request, to_openai_request, CompletionRequestBuilder};
pub use streaming::{decode_line, LineReader, StreamDecoder, StreamEvent};
pub use types::{OpenAIRequest, OpenAIStreamChunk};
