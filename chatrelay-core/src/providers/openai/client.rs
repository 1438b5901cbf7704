//! OpenAI client implementation

use super::converter::to_openai_request;
use crate::config::SecretString;
use crate::error::{RelayError, RelayResult};
use crate::http::client::HttpClient;
use crate::http::RequestOptions;
use crate::protocol::CompletionRequest;
use crate::providers::{ByteStream, CompletionProvider};
use async_trait::async_trait;
use futures::StreamExt;

/// Default public endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI provider implementation
pub struct OpenAIProvider {
    name: String,
    base_url: String,
    api_key: SecretString,
    client: HttpClient,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: SecretString,
        client: HttpClient,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            name: name.into(),
            base_url,
            api_key,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, options: &RequestOptions) -> String {
        format!("{}{}", self.base_url, options.call_kind.endpoint())
    }
}

#[async_trait]
impl CompletionProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
        options: RequestOptions,
    ) -> RelayResult<ByteStream> {
        let url = self.url(&options);
        let body = to_openai_request(&request);

        let response = self
            .client
            .post_stream(&self.name, &url, &self.api_key, &body, &options)
            .await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(RelayError::from))
            .boxed())
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .finish()
    }
}
