//! Configuration validation utilities

use super::env::placeholder_pattern;
use super::error::{ValidationError, ValidationErrorKind};
use super::schema::RelayConfig;
use std::net::SocketAddr;

/// Configuration validator with rules beyond the schema's own checks
#[derive(Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &RelayConfig) -> Result<(), ValidationError> {
        self.validate_placeholders(config)?;
        config.validate()?;
        self.validate_bind(config)?;
        self.validate_policy(config)?;
        Ok(())
    }

    /// Placeholders that survived interpolation mean a variable was never resolved
    fn validate_placeholders(&self, config: &RelayConfig) -> Result<(), ValidationError> {
        let fields = [
            ("provider.api_key", config.provider.api_key.expose_secret()),
            ("provider.base_url", config.provider.base_url.as_str()),
            ("provider.model", config.provider.model.as_str()),
        ];

        for (path, value) in fields {
            if let Some(var) = self.extract_env_vars(value).into_iter().next() {
                return Err(ValidationError::new(
                    path,
                    ValidationErrorKind::UnresolvedPlaceholder { placeholder: var },
                ));
            }
        }
        Ok(())
    }

    fn validate_bind(&self, config: &RelayConfig) -> Result<(), ValidationError> {
        config
            .server
            .bind
            .parse::<SocketAddr>()
            .map(|_| ())
            .map_err(|e| {
                ValidationError::invalid_format("server.bind", e.to_string())
                    .with_context("expected host:port, e.g. 127.0.0.1:3000")
            })
    }

    fn validate_policy(&self, config: &RelayConfig) -> Result<(), ValidationError> {
        if config.conversation.max_turns == Some(0) {
            return Err(ValidationError::out_of_range(
                "conversation.max_turns",
                "max_turns must be at least 1 when set",
            ));
        }
        Ok(())
    }

    /// Extract environment variables from a string
    pub fn extract_env_vars(&self, text: &str) -> Vec<String> {
        placeholder_pattern()
            .captures_iter(text)
            .map(|cap| cap[1].to_string())
            .collect()
    }
}
