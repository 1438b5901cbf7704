//! Relay error types and handling

use thiserror::Error;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur during one prompt lifecycle
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The prompt was rejected before any upstream work
    #[error("Bad input: {0}")]
    BadInput(String),

    /// Connection, TLS, body read or deadline failure reaching the provider
    #[error("Upstream transport error: {message}")]
    UpstreamTransport { message: String, timed_out: bool },

    /// The provider answered with a non-success status
    #[error("Upstream returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// The provider's stream could not be decoded
    #[error("Failed to decode upstream stream: {message}")]
    Decode { message: String },

    /// Publish or take attempted after the relay was shut down
    #[error("Fragment relay is closed")]
    RelayClosed,
}

impl RelayError {
    /// Short machine-readable kind, used by the HTTP boundary
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "bad_input",
            Self::UpstreamTransport { .. } => "upstream_transport",
            Self::UpstreamStatus { .. } => "upstream_status",
            Self::Decode { .. } => "decode",
            Self::RelayClosed => "relay_closed",
        }
    }

    /// Whether the failure came from the turn deadline or a transport timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::UpstreamTransport { timed_out: true, .. })
    }

    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::UpstreamTransport {
            message: message.into(),
            timed_out: false,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::UpstreamTransport {
                message: err.to_string(),
                timed_out: true,
            }
        } else if err.is_connect() {
            RelayError::transport(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            RelayError::UpstreamStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RelayError::transport(err.to_string())
        }
    }
}
