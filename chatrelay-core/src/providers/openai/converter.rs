//! Request building and conversion to the OpenAI wire format

use super::types::{OpenAIMessage, OpenAIRequest};
use crate::error::{RelayError, RelayResult};
use crate::protocol::{CompletionRequest, Message};

/// Builds per-turn completion requests for a fixed model and token limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequestBuilder {
    model: String,
    max_tokens: u32,
}

impl CompletionRequestBuilder {
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    /// Reject prompts that must never reach the provider
    pub fn check_prompt(&self, prompt: &str) -> RelayResult<()> {
        validate_prompt(prompt)
    }

    /// Context snapshot plus the new user prompt, as a streaming request
    pub fn build(&self, history: &[Message], prompt: &str) -> RelayResult<CompletionRequest> {
        build_request(history, prompt, &self.model, self.max_tokens)
    }
}

/// Append `prompt` as a user message to `history` and produce a streaming request.
///
/// Pure: the same inputs always give the same request. Fails only on an empty prompt.
pub fn build_request(
    history: &[Message],
    prompt: &str,
    model: &str,
    max_tokens: u32,
) -> RelayResult<CompletionRequest> {
    validate_prompt(prompt)?;

    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(Message::user(prompt));

    Ok(CompletionRequest::new(model, messages, max_tokens))
}

fn validate_prompt(prompt: &str) -> RelayResult<()> {
    if prompt.trim().is_empty() {
        return Err(RelayError::BadInput("prompt must not be empty".to_string()));
    }
    Ok(())
}

/// Convert a CompletionRequest to OpenAI format
pub fn to_openai_request(request: &CompletionRequest) -> OpenAIRequest {
    OpenAIRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(to_openai_message).collect(),
        max_tokens: request.max_tokens,
        stream: request.stream,
    }
}

fn to_openai_message(message: &Message) -> OpenAIMessage {
    OpenAIMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
    }
}
