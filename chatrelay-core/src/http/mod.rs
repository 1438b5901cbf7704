//! HTTP module for talking to completion providers
//!
//! This module implements the HTTP layer for chatrelay, handling:
//! - Connection pooling and client management
//! - Streaming POST requests
//! - Error mapping for transport failures and non-success statuses
//! - Request ID generation and correlation

pub mod client;
pub mod error;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of API call being made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    /// Chat completion request
    Chat,
}

impl CallKind {
    /// Get the endpoint path for this call kind
    pub fn endpoint(&self) -> &str {
        match self {
            CallKind::Chat => "/chat/completions",
        }
    }
}

/// Options for an HTTP request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Type of API call
    pub call_kind: CallKind,

    /// Unique request ID for correlation, sent as `X-Request-ID`
    pub request_id: Uuid,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(CallKind::Chat)
    }
}

impl RequestOptions {
    /// Create new request options with a generated request ID
    pub fn new(call_kind: CallKind) -> Self {
        Self {
            call_kind,
            request_id: Uuid::new_v4(),
        }
    }

    /// Use an existing request ID, e.g. the id of the turn being served
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }
}
