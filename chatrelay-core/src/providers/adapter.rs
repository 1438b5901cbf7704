//! Provider abstraction
//!
//! A provider opens one streaming completion per turn and hands back the raw
//! response body. Decoding that body is the session's job, so providers only
//! deal with transport concerns.

use crate::error::RelayResult;
use crate::http::RequestOptions;
use crate::protocol::CompletionRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Raw chunked response body of a streaming completion
pub type ByteStream = BoxStream<'static, RelayResult<Bytes>>;

/// An upstream completion service
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Get the provider's name
    fn name(&self) -> &str;

    /// Issue the request and return the response body once a success status arrived.
    ///
    /// Transport failures map to `UpstreamTransport`, non-2xx statuses to `UpstreamStatus`.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        options: RequestOptions,
    ) -> RelayResult<ByteStream>;
}
