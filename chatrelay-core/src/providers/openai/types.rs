//! OpenAI chat completions wire types
//!
//! These types match the OpenAI API format and are used for serialization/deserialization
//! when talking to OpenAI or any OpenAI-compatible server.

use serde::{Deserialize, Serialize};

/// OpenAI chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    pub max_tokens: u32,
    pub stream: bool,
}

/// OpenAI message format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: String,
}

/// One `data:` payload of a streaming response (the delta envelope)
#[derive(Debug, Deserialize)]
pub struct OpenAIStreamChunk {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    pub choices: Vec<OpenAIStreamChoice>,
}

/// OpenAI streaming choice
#[derive(Debug, Deserialize)]
pub struct OpenAIStreamChoice {
    #[serde(default)]
    pub index: usize,

    #[serde(default)]
    pub delta: OpenAIDelta,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// OpenAI delta for streaming
#[derive(Debug, Deserialize, Default)]
pub struct OpenAIDelta {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub content: Option<String>,
}

/// OpenAI error response
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAIError {
    pub error: OpenAIErrorDetail,
}

/// OpenAI error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAIErrorDetail {
    pub message: String,

    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub code: Option<String>,
}
