use std::time::Duration;
use thiserror::Error;

/// Failures raised by the push and poll transports.
///
/// These never escape to subscribers; the distributor answers every one of
/// them by falling back a delivery tier or dropping the affected message.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("update endpoint returned status {0}")]
    Status(u16),
}
