//! Configuration schema structures with serde support

use super::error::{ValidationError, ValidationErrorKind};
use super::secrets::{SafeLogging, SecretString};
use crate::session::MalformedLinePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current schema version
pub const CONFIG_VERSION: &str = "0.1";

/// Root configuration structure for chatrelay
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,

    /// Upstream completion provider
    pub provider: ProviderConfig,

    /// Fragment relay settings
    #[serde(default)]
    pub relay: RelaySettings,

    /// Conversation seeding and context trimming
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Upstream connection settings
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Stream decoding behaviour
    #[serde(default)]
    pub decoding: DecodingConfig,

    /// HTTP front end
    #[serde(default)]
    pub server: ServerConfig,
}

/// Completion provider configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Name used in logs
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Base URL for the provider API (the chat endpoint path is appended)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (supports environment variable interpolation)
    pub api_key: SecretString,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens generated per turn
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Fragment relay configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySettings {
    /// Fragments buffered before producers block
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// Conversation configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Seed system message
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Only send the last N turns upstream (the log itself is never trimmed)
    #[serde(default)]
    pub max_turns: Option<usize>,
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Deadline for one whole turn (request plus streaming) in milliseconds
    #[serde(default)]
    pub turn_timeout_ms: Option<u64>,

    /// Maximum idle connections per host
    #[serde(default = "default_max_idle")]
    pub max_idle_per_host: usize,

    /// Keep-alive timeout in seconds
    #[serde(default = "default_keepalive")]
    pub keepalive_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            turn_timeout_ms: None,
            max_idle_per_host: default_max_idle(),
            keepalive_secs: default_keepalive(),
        }
    }
}

impl ConnectionConfig {
    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout_ms.map(Duration::from_millis)
    }
}

/// Decoding configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DecodingConfig {
    /// What to do with a stream line that is not a valid delta envelope
    #[serde(default)]
    pub malformed_lines: MalformedLinePolicy,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

// Default value functions for serde
fn default_version() -> String { CONFIG_VERSION.to_string() }
fn default_provider_name() -> String { "openai".to_string() }
fn default_base_url() -> String { crate::providers::openai::DEFAULT_BASE_URL.to_string() }
fn default_model() -> String { "gpt-3.5-turbo-16k".to_string() }
fn default_max_tokens() -> u32 { 150 }
fn default_capacity() -> usize { crate::relay::DEFAULT_CAPACITY }
fn default_connect_timeout() -> u64 { 10000 }
fn default_max_idle() -> usize { 10 }
fn default_keepalive() -> u64 { 90 }
fn default_bind() -> String { "127.0.0.1:3000".to_string() }

impl RelayConfig {
    /// Configuration with defaults everywhere except the API key
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            version: default_version(),
            provider: ProviderConfig {
                name: default_provider_name(),
                base_url: default_base_url(),
                api_key: api_key.into(),
                model: default_model(),
                max_tokens: default_max_tokens(),
            },
            relay: RelaySettings::default(),
            conversation: ConversationConfig::default(),
            connection: ConnectionConfig::default(),
            decoding: DecodingConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }

        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: CONFIG_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        self.provider.validate("provider")?;

        if self.relay.capacity == 0 {
            return Err(ValidationError::out_of_range(
                "relay.capacity",
                "Relay capacity must be at least 1",
            ));
        }

        if self.connection.connect_timeout_ms == 0 {
            return Err(ValidationError::out_of_range(
                "connection.connect_timeout_ms",
                "Connect timeout must be positive",
            ));
        }

        if self.connection.turn_timeout_ms == Some(0) {
            return Err(ValidationError::out_of_range(
                "connection.turn_timeout_ms",
                "Turn timeout must be positive when set",
            ));
        }

        Ok(())
    }
}

impl ProviderConfig {
    /// Validate provider configuration
    pub fn validate(&self, path: &str) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::required(format!("{}.name", path)));
        }

        if self.api_key.is_empty() {
            return Err(ValidationError::required(format!("{}.api_key", path)));
        }

        if self.model.is_empty() {
            return Err(ValidationError::required(format!("{}.model", path)));
        }

        if self.max_tokens == 0 {
            return Err(ValidationError::out_of_range(
                format!("{}.max_tokens", path),
                "max_tokens must be positive",
            ));
        }

        if self.base_url.is_empty() {
            return Err(ValidationError::required(format!("{}.base_url", path)));
        }

        match url::Url::parse(&self.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
            Ok(url) => Err(ValidationError::new(
                format!("{}.base_url", path),
                ValidationErrorKind::InvalidUrl {
                    message: format!("unsupported scheme '{}'", url.scheme()),
                },
            )),
            Err(e) => Err(ValidationError::new(
                format!("{}.base_url", path),
                ValidationErrorKind::InvalidUrl {
                    message: e.to_string(),
                },
            )),
        }
    }
}

impl SafeLogging for RelayConfig {
    fn safe_for_logging(&self) -> String {
        format!(
            "provider={} base_url={} model={} max_tokens={} api_key={} relay.capacity={} \
             conversation.max_turns={:?} decoding.malformed_lines={:?} server.bind={}",
            self.provider.name,
            self.provider.base_url,
            self.provider.model,
            self.provider.max_tokens,
            self.provider.api_key.partial_redact(),
            self.relay.capacity,
            self.conversation.max_turns,
            self.decoding.malformed_lines,
            self.server.bind,
        )
    }
}
