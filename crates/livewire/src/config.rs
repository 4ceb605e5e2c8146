//! Endpoints and timing knobs for the realtime distributor.

use std::time::Duration;

use duration_string::DurationString;
use serde::{Deserialize, Serialize};

use crate::backoff::ReconnectPolicy;

/// Durations deserialize from human-readable strings such as `"30s"` or
/// `"250ms"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveWireConfig {
    /// WebSocket endpoint for the push channel.
    pub push_url: String,
    /// GET endpoint answering with one envelope or a batch of them.
    pub poll_url: String,
    /// POST endpoint answering a `{dataType, params}` request synchronously.
    pub request_update_url: String,
    pub connect_timeout: DurationString,
    pub poll_interval: DurationString,
    pub reconnect_base_delay: DurationString,
    pub max_reconnect_attempts: u32,
}

impl Default for LiveWireConfig {
    fn default() -> Self {
        Self {
            push_url: "ws://127.0.0.1:9300/realtime".to_string(),
            poll_url: "http://127.0.0.1:9300/realtime/updates".to_string(),
            request_update_url: "http://127.0.0.1:9300/realtime/request-update".to_string(),
            connect_timeout: Duration::from_secs(5).into(),
            poll_interval: Duration::from_secs(30).into(),
            reconnect_base_delay: Duration::from_secs(1).into(),
            max_reconnect_attempts: 5,
        }
    }
}

impl LiveWireConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.reconnect_base_delay.into(),
            self.max_reconnect_attempts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = LiveWireConfig::default();
        assert_eq!(Duration::from(config.connect_timeout), Duration::from_secs(5));
        assert_eq!(Duration::from(config.poll_interval), Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert!(config.push_url.starts_with("ws://"));
    }

    #[test]
    fn test_yaml_with_human_readable_durations() {
        let yaml = r#"
push_url: "wss://feedback.example.com/realtime"
poll_interval: 250ms
reconnect_base_delay: 2s
"#;
        let config: LiveWireConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.push_url, "wss://feedback.example.com/realtime");
        assert_eq!(
            Duration::from(config.poll_interval),
            Duration::from_millis(250)
        );
        let policy = config.reconnect_policy();
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.max_attempts, 5);
    }
}
