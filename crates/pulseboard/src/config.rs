//! YAML configuration for the pulseboard service.
//!
//! Every section is optional. An absent (or empty) file yields the built-in
//! scoring constants and local endpoints, so the binary runs with zero
//! configuration in development.

use std::env;
use std::fs;
use std::path::Path;

use livewire::LiveWireConfig;
use scorecard::{Lexicon, ScoringConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the config file path.
pub const CONFIG_PATH_ENV: &str = "PULSEBOARD_CONFIG";
/// Environment variable overriding the file's auth token.
pub const AUTH_TOKEN_ENV: &str = "PULSEBOARD_TOKEN";
const DEFAULT_CONFIG_PATH: &str = "./pulseboard.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseboardConfig {
    /// Token presented to the realtime endpoints. The `PULSEBOARD_TOKEN`
    /// environment variable takes precedence over this field.
    pub auth_token: Option<String>,
    pub scoring: ScoringConfig,
    pub lexicon: Lexicon,
    pub live: LiveWireConfig,
}

impl PulseboardConfig {
    /// Config file path from the environment, defaulting to
    /// `./pulseboard.yaml`.
    pub fn path_from_env() -> String {
        env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Like [`load`](Self::load), but a missing file counts as an empty one.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects a fully empty document, which here just means
        // "all defaults".
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Auth token with the environment override applied. Empty string when
    /// neither source provides one.
    pub fn resolved_token(&self) -> String {
        env::var(AUTH_TOKEN_ENV)
            .ok()
            .or_else(|| self.auth_token.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = PulseboardConfig::from_yaml("").unwrap();
        assert_eq!(config, PulseboardConfig::default());
        assert!(config.auth_token.is_none());
        assert_eq!(config.scoring.numeric_channel_weight, 0.6);
        assert_eq!(config.live.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_partial_yaml_keeps_remaining_defaults() {
        let yaml = r#"
auth_token: "secret"
scoring:
  text_signal_weight: 0.7
live:
  poll_interval: "10s"
  push_url: "ws://feedback.internal:9300/realtime"
"#;
        let config = PulseboardConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.scoring.text_signal_weight, 0.7);
        // Untouched sections keep their built-in values.
        assert_eq!(config.scoring.numeric_channel_weight, 0.6);
        assert_eq!(
            config.live.push_url,
            "ws://feedback.internal:9300/realtime"
        );
        assert_eq!(
            std::time::Duration::from(config.live.poll_interval),
            std::time::Duration::from_secs(10)
        );
        assert!(!config.lexicon.positive_words.is_empty());
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let result = PulseboardConfig::from_yaml("scoring: [not, a, map]");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_handling() {
        let missing = "/nonexistent/pulseboard-test.yaml";
        assert!(matches!(
            PulseboardConfig::load(missing),
            Err(ConfigError::Io(_))
        ));
        let config = PulseboardConfig::load_or_default(missing).unwrap();
        assert_eq!(config, PulseboardConfig::default());
    }
}
