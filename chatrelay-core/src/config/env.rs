//! Environment variable interpolation and overrides for configuration

use super::error::ConfigError;
use super::schema::RelayConfig;
use super::secrets::SecretString;
use regex::Regex;
use std::env;
use std::str::FromStr;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid placeholder regex"));

pub(crate) fn placeholder_pattern() -> &'static Regex {
    &ENV_VAR_PATTERN
}

/// Interpolate environment variables in a configuration string
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    interpolate_with(content, |name| env::var(name).ok())
}

fn interpolate_with<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut last = 0;

    for cap in ENV_VAR_PATTERN.captures_iter(content) {
        let Some(full) = cap.get(0) else { continue };
        let var_name = &cap[1];
        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVarNotFound {
            var: var_name.to_string(),
        })?;
        result.push_str(&content[last..full.start()]);
        result.push_str(&value);
        last = full.end();
    }
    result.push_str(&content[last..]);

    Ok(result)
}

/// Interpolate the fields of an already parsed config that may carry placeholders
pub fn interpolate_config_env_vars(config: &mut RelayConfig) -> Result<(), ConfigError> {
    let api_key = config.provider.api_key.expose_secret();
    if ENV_VAR_PATTERN.is_match(api_key) {
        config.provider.api_key = SecretString::new(interpolate_env_vars(api_key)?);
    }

    if ENV_VAR_PATTERN.is_match(&config.provider.model) {
        config.provider.model = interpolate_env_vars(&config.provider.model)?;
    }

    if ENV_VAR_PATTERN.is_match(&config.provider.base_url) {
        config.provider.base_url = interpolate_env_vars(&config.provider.base_url)?;
    }

    if let Some(prompt) = &config.conversation.system_prompt {
        if ENV_VAR_PATTERN.is_match(prompt) {
            config.conversation.system_prompt = Some(interpolate_env_vars(prompt)?);
        }
    }

    Ok(())
}

/// Build a configuration from `CHATRELAY_*` variables and `OPENAI_API_KEY`
pub fn from_env() -> Result<RelayConfig, ConfigError> {
    let api_key = env::var("OPENAI_API_KEY").map_err(|_| ConfigError::EnvVarNotFound {
        var: "OPENAI_API_KEY".to_string(),
    })?;
    let mut config = RelayConfig::new(api_key);
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Override individual settings from the environment when the variables are set
pub fn apply_env_overrides(config: &mut RelayConfig) -> Result<(), ConfigError> {
    apply_overrides_with(config, |name| env::var(name).ok())
}

fn apply_overrides_with<F>(config: &mut RelayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup("OPENAI_API_KEY") {
        config.provider.api_key = SecretString::new(key);
    }
    if let Some(model) = lookup("CHATRELAY_MODEL") {
        config.provider.model = model;
    }
    if let Some(base_url) = lookup("CHATRELAY_BASE_URL") {
        config.provider.base_url = base_url;
    }
    if let Some(value) = lookup("CHATRELAY_MAX_TOKENS") {
        config.provider.max_tokens = parse_var("CHATRELAY_MAX_TOKENS", value)?;
    }
    if let Some(value) = lookup("CHATRELAY_RELAY_CAPACITY") {
        config.relay.capacity = parse_var("CHATRELAY_RELAY_CAPACITY", value)?;
    }
    if let Some(prompt) = lookup("CHATRELAY_SYSTEM_PROMPT") {
        config.conversation.system_prompt = Some(prompt);
    }
    if let Some(value) = lookup("CHATRELAY_MAX_TURNS") {
        config.conversation.max_turns = Some(parse_var("CHATRELAY_MAX_TURNS", value)?);
    }
    if let Some(value) = lookup("CHATRELAY_TURN_TIMEOUT_MS") {
        config.connection.turn_timeout_ms = Some(parse_var("CHATRELAY_TURN_TIMEOUT_MS", value)?);
    }
    if let Some(value) = lookup("CHATRELAY_MALFORMED_LINES") {
        config.decoding.malformed_lines = parse_var("CHATRELAY_MALFORMED_LINES", value)?;
    }
    if let Some(bind) = lookup("CHATRELAY_BIND") {
        config.server.bind = bind;
    }
    Ok(())
}

fn parse_var<T>(var: &str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        value,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MalformedLinePolicy;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_interpolate_env_vars() {
        let result = interpolate_with(
            "api_key: ${TEST_VAR}",
            lookup(&[("TEST_VAR", "test_value")]),
        );
        assert_eq!(result.unwrap(), "api_key: test_value");
    }

    #[test]
    fn test_missing_env_var() {
        let result = interpolate_with("api_key: ${MISSING_VAR}", lookup(&[]));
        match result {
            Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "MISSING_VAR"),
            other => panic!("Expected EnvVarNotFound error, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_env_vars() {
        let result = interpolate_with(
            "key1: ${VAR1}, key2: ${VAR2}, again: ${VAR1}",
            lookup(&[("VAR1", "value1"), ("VAR2", "value2")]),
        );
        assert_eq!(result.unwrap(), "key1: value1, key2: value2, again: value1");
    }

    #[test]
    fn test_value_containing_placeholder_is_not_reexpanded() {
        let result = interpolate_with("${A}", lookup(&[("A", "${B}"), ("B", "nope")]));
        assert_eq!(result.unwrap(), "${B}");
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = RelayConfig::new("from-file");
        apply_overrides_with(
            &mut config,
            lookup(&[
                ("CHATRELAY_MODEL", "gpt-4o-mini"),
                ("CHATRELAY_MAX_TOKENS", "64"),
                ("CHATRELAY_RELAY_CAPACITY", "3"),
                ("CHATRELAY_MALFORMED_LINES", "Abort"),
            ]),
        )
        .unwrap();

        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.max_tokens, 64);
        assert_eq!(config.relay.capacity, 3);
        assert_eq!(config.decoding.malformed_lines, MalformedLinePolicy::Abort);
        assert_eq!(config.provider.api_key.expose_secret(), "from-file");
    }

    #[test]
    fn test_invalid_numeric_override() {
        let mut config = RelayConfig::new("k");
        let err = apply_overrides_with(&mut config, lookup(&[("CHATRELAY_MAX_TOKENS", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvVar { ref var, .. } if var == "CHATRELAY_MAX_TOKENS"
        ));
    }
}
