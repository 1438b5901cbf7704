//! Configuration module for chatrelay
//!
//! Settings come from a YAML or JSON file (with `${VAR}` interpolation in
//! string values) or
//! purely from the environment, where individual `CHATRELAY_*` variables
//! override the defaults.

mod env;
mod error;
mod schema;
mod secrets;
mod validator;

pub use env::{apply_env_overrides, from_env, interpolate_env_vars};
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{
    ConnectionConfig, ConversationConfig, DecodingConfig, ProviderConfig, RelayConfig,
    RelaySettings, ServerConfig, CONFIG_VERSION,
};
pub use secrets::{SafeLogging, SecretString};
pub use validator::ConfigValidator;

use std::fs;
use std::path::Path;

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

/// Placeholders are resolved in parsed values only, never in the raw file text
fn finish(mut config: RelayConfig) -> ConfigResult<RelayConfig> {
    env::interpolate_config_env_vars(&mut config)?;
    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<RelayConfig> {
    let path = path.as_ref();
    let content = read(path)?;

    let config: RelayConfig =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;

    finish(config)
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<RelayConfig> {
    let path = path.as_ref();
    let content = read(path)?;

    let config: RelayConfig =
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_string_lossy().to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;

    finish(config)
}

/// Load a configuration from the environment alone
pub fn load_from_env() -> ConfigResult<RelayConfig> {
    let config = env::from_env()?;
    ConfigValidator::new().validate(&config)?;
    Ok(config)
}

/// Load a configuration file, picking the parser from its extension
pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<RelayConfig> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => load_from_yaml(path),
        Some("json") => load_from_json(path),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_string_lossy().to_string(),
        }),
    }
}
