//! Wire envelope carried on both the push channel and the poll endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Well-known event type strings. The set is open: unrecognized types are
/// still delivered to exact-type and wildcard subscribers.
pub mod event_types {
    pub const FORM_RESPONSE: &str = "form_response";
    pub const SCORE_UPDATE: &str = "score_update";
    pub const ANALYTICS_UPDATE: &str = "analytics_update";
    pub const FORM_STATUS_CHANGE: &str = "form_status_change";
    pub const NEW_FORM: &str = "new_form";
    pub const USER_ACTIVITY: &str = "user_activity";
    pub const SYSTEM_ALERT: &str = "system_alert";
    pub const REQUEST_UPDATE: &str = "request_update";
    /// Subscription key receiving every envelope regardless of type.
    pub const WILDCARD: &str = "*";
}

/// One `{type, payload, timestamp}` envelope as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl DistributionEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Parses a single envelope, dropping malformed input with a warning.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, "dropping malformed distribution event");
                None
            }
        }
    }

    /// Parses a poll response, which may be one envelope or a batch.
    ///
    /// Malformed array elements are dropped individually so one bad entry
    /// does not discard the rest of the batch.
    pub fn parse_batch(raw: &str) -> Vec<Self> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "dropping malformed poll payload");
                return Vec::new();
            }
        };
        match value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value(item) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(error = %e, "dropping malformed event in poll batch");
                        None
                    }
                })
                .collect(),
            Value::Object(_) => match serde_json::from_value(value) {
                Ok(event) => vec![event],
                Err(e) => {
                    warn!(error = %e, "dropping malformed distribution event");
                    Vec::new()
                }
            },
            other => {
                warn!(payload_kind = ?other, "poll payload is neither object nor array");
                Vec::new()
            }
        }
    }
}
