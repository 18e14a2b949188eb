//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for environment variable {key}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. Fatal problems are returned; the upstream URL is
/// checked again on every request.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RelayConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment-style keys onto `config`.
///
/// `lookup` abstracts the environment so callers (and tests) can supply any
/// key/value source. Empty values count as unset.
pub fn apply_env<F>(config: &mut RelayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(port) = get("PORT") {
        config.listener.port = parse_env("PORT", port)?;
    }
    if let Some(host) = get("HOST") {
        config.listener.host = host;
    }

    if let Some(base_url) = get("ANTHROPIC_BASE_URL") {
        config.upstream.base_url = base_url;
    }
    if let Some(token) = get("ANTHROPIC_AUTH_TOKEN") {
        config.upstream.fallback_token = Some(token);
    }

    if let Some(limit) = get("BODY_LIMIT") {
        config.limits.body_limit = limit;
    }

    if let Some(enabled) = get("RESIDENTIAL_PROXY_ENABLED") {
        config.socks.enabled = enabled != "false";
    }
    if let Some(url) = get("RESIDENTIAL_PROXY_URL") {
        config.socks.url = Some(url);
    }
    if let Some(host) = get("RESIDENTIAL_PROXY_HOST") {
        config.socks.host = host;
    }
    if let Some(port) = get("RESIDENTIAL_PROXY_PORT") {
        config.socks.port = parse_env("RESIDENTIAL_PROXY_PORT", port)?;
    }
    if let Some(username) = get("RESIDENTIAL_PROXY_USERNAME") {
        config.socks.username = Some(username);
    }
    if let Some(password) = get("RESIDENTIAL_PROXY_PASSWORD") {
        config.socks.password = Some(password);
    }

    if let Some(secs) = get("UPSTREAM_CONNECT_TIMEOUT_SECS") {
        config.timeouts.connect_secs = parse_env("UPSTREAM_CONNECT_TIMEOUT_SECS", secs)?;
    }

    if let Some(addr) = get("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(addr);
    }
    if let Some(flag) = get("LOG_HEADERS") {
        config.observability.log_headers = matches!(flag.as_str(), "1" | "true" | "yes");
    }

    Ok(())
}

fn parse_env<T: FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = RelayConfig::default();
        apply_env(
            &mut config,
            env(&[
                ("PORT", "8080"),
                ("ANTHROPIC_BASE_URL", "http://localhost:9000"),
                ("ANTHROPIC_AUTH_TOKEN", "sk-fallback"),
                ("BODY_LIMIT", "1mb"),
                ("RESIDENTIAL_PROXY_HOST", "proxy.internal"),
                ("RESIDENTIAL_PROXY_PORT", "9050"),
                ("RESIDENTIAL_PROXY_USERNAME", "alice"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.upstream.base_url, "http://localhost:9000");
        assert_eq!(config.upstream.fallback_token.as_deref(), Some("sk-fallback"));
        assert_eq!(config.limits.body_limit, "1mb");
        assert_eq!(config.socks.host, "proxy.internal");
        assert_eq!(config.socks.port, 9050);
        assert_eq!(config.socks.username.as_deref(), Some("alice"));
        assert!(config.socks.password.is_none());
    }

    #[test]
    fn only_literal_false_disables_socks() {
        let mut config = RelayConfig::default();
        apply_env(&mut config, env(&[("RESIDENTIAL_PROXY_ENABLED", "0")])).unwrap();
        assert!(config.socks.enabled);

        apply_env(&mut config, env(&[("RESIDENTIAL_PROXY_ENABLED", "false")])).unwrap();
        assert!(!config.socks.enabled);
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut config = RelayConfig::default();
        apply_env(
            &mut config,
            env(&[("ANTHROPIC_BASE_URL", ""), ("ANTHROPIC_AUTH_TOKEN", "")]),
        )
        .unwrap();
        assert_eq!(config.upstream.base_url, "https://api.anthropic.com");
        assert!(config.upstream.fallback_token.is_none());
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = RelayConfig::default();
        let err = apply_env(&mut config, env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "PORT", .. }));
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [upstream]
            base_url = "http://127.0.0.1:4000"

            [limits]
            body_limit = "512kb"
            "#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.limits.body_limit, "512kb");
    }

    #[test]
    fn invalid_body_limit_in_file_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nbody_limit = \"lots\"").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
