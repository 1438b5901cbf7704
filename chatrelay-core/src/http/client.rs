//! HTTP client implementation using reqwest

use crate::config::{ConnectionConfig, SecretString};
use crate::error::{RelayError, RelayResult};
use crate::http::error::map_http_error;
use crate::http::RequestOptions;
use reqwest::{Client, ClientBuilder, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default user agent
const USER_AGENT: &str = concat!("chatrelay/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client with connection pooling.
///
/// No overall request timeout is set: streaming bodies stay open for as long
/// as the provider generates. Turn deadlines are enforced by the session.
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> RelayResult<Self> {
        Self::with_config(&ConnectionConfig::default())
    }

    /// Create a new HTTP client from connection settings
    pub fn with_config(config: &ConnectionConfig) -> RelayResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.keepalive_secs))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(|e| RelayError::transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// POST a JSON body and return the response once a success status arrived.
    ///
    /// The body of the returned response has not been read.
    pub async fn post_stream<B: Serialize + ?Sized>(
        &self,
        provider: &str,
        url: &str,
        api_key: &SecretString,
        body: &B,
        options: &RequestOptions,
    ) -> RelayResult<Response> {
        let request_id = options.request_id;
        debug!("Request URL: {} [request_id: {}]", url, request_id);

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key.expose_secret())
            .header("Accept", "text/event-stream")
            .header("X-Request-ID", request_id.to_string())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("Request timeout for {} [request_id: {}]", provider, request_id);
                    RelayError::UpstreamTransport {
                        message: format!("Request timed out: {} [request_id: {}]", e, request_id),
                        timed_out: true,
                    }
                } else if e.is_connect() {
                    error!("Connection error for {} [request_id: {}]: {}", provider, request_id, e);
                    RelayError::transport(format!(
                        "Connection failed: {} [request_id: {}]",
                        e, request_id
                    ))
                } else {
                    error!("Request error for {} [request_id: {}]: {}", provider, request_id, e);
                    RelayError::transport(format!("{} [request_id: {}]", e, request_id))
                }
            })?;

        let status = response.status();
        debug!("Response status: {} [request_id: {}]", status, request_id);

        if !status.is_success() {
            let body = response.text().await.ok();
            warn!(
                "Request failed with status {} for {} [request_id: {}]",
                status, provider, request_id
            );
            return Err(map_http_error(status, body, request_id));
        }

        Ok(response)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_creation() {
        assert!(HttpClient::new().is_ok());
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("chatrelay/"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let client = HttpClient::new().unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let err = client
            .post_stream(
                "test",
                "http://127.0.0.1:9/chat/completions",
                &SecretString::new("k"),
                &serde_json::json!({}),
                &RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UpstreamTransport { .. }));
    }
}
