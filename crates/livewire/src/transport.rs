//! Transport seams between the distributor and the outside world.
//!
//! The distributor only ever talks to [`PushTransport`] and
//! [`PollTransport`], so tests can drive it with scripted in-process doubles
//! while production wires in [`WebSocketTransport`] and
//! [`HttpPollTransport`].

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;

/// Close code reported when the peer closed without a status code.
const CLOSE_NO_STATUS: u16 = 1005;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One inbound event on the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    Text(String),
    Closed { code: u16 },
}

/// Write half of an established push channel.
#[async_trait]
pub trait PushSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;
    async fn close(&mut self, code: u16) -> Result<(), TransportError>;
}

/// Read half of an established push channel.
#[async_trait]
pub trait PushStream: Send {
    /// Next inbound event, or `None` once the stream is exhausted.
    async fn next_event(&mut self) -> Option<Result<PushEvent, TransportError>>;
}

/// Connector for the push tier.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(
        &self,
        token: &str,
    ) -> Result<(Box<dyn PushSink>, Box<dyn PushStream>), TransportError>;
}

/// Fallback tier: periodic GET plus a synchronous request-update POST.
#[async_trait]
pub trait PollTransport: Send + Sync {
    async fn poll(&self, token: &str) -> Result<String, TransportError>;
    async fn request_update(&self, token: &str, body: Value) -> Result<String, TransportError>;
}

// ============================================================================
// WebSocket push transport
// ============================================================================

type WsConnection = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Auth travels as a query parameter since websocket handshakes cannot
    /// carry custom headers from browser peers, and the server accepts the
    /// same form here.
    fn url_with_token(&self, token: &str) -> String {
        if token.is_empty() {
            return self.url.clone();
        }
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}token={}",
            self.url,
            separator,
            urlencoding::encode(token)
        )
    }
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    async fn connect(
        &self,
        token: &str,
    ) -> Result<(Box<dyn PushSink>, Box<dyn PushStream>), TransportError> {
        let url = self.url_with_token(token);
        let (stream, _response) = connect_async(&url).await?;
        let (write, read) = stream.split();
        Ok((Box::new(WsSink { write }), Box::new(WsStream { read })))
    }
}

struct WsSink {
    write: SplitSink<WsConnection, Message>,
}

#[async_trait]
impl PushSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.write.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        self.write
            .send(Message::Close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: Cow::Borrowed(""),
            })))
            .await?;
        Ok(())
    }
}

struct WsStream {
    read: SplitStream<WsConnection>,
}

#[async_trait]
impl PushStream for WsStream {
    async fn next_event(&mut self) -> Option<Result<PushEvent, TransportError>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(PushEvent::Text(text))),
                Ok(Message::Close(frame)) => {
                    let code = frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_NO_STATUS);
                    return Some(Ok(PushEvent::Closed { code }));
                }
                // Ping, pong, and binary frames carry no distribution events.
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

// ============================================================================
// HTTP poll transport
// ============================================================================

pub struct HttpPollTransport {
    client: Client,
    poll_url: String,
    request_update_url: String,
}

impl HttpPollTransport {
    pub fn new(poll_url: impl Into<String>, request_update_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            poll_url: poll_url.into(),
            request_update_url: request_update_url.into(),
        }
    }
}

#[async_trait]
impl PollTransport for HttpPollTransport {
    async fn poll(&self, token: &str) -> Result<String, TransportError> {
        let mut request = self.client.get(&self.poll_url).timeout(HTTP_TIMEOUT);
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(response.text().await?)
    }

    async fn request_update(&self, token: &str, body: Value) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(&self.request_update_url)
            .timeout(HTTP_TIMEOUT)
            .json(&body);
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_token_appended_as_query_parameter() {
        let transport = WebSocketTransport::new("ws://host/realtime");
        assert_eq!(
            transport.url_with_token("abc123"),
            "ws://host/realtime?token=abc123"
        );
    }

    #[test]
    fn test_token_is_percent_encoded() {
        let transport = WebSocketTransport::new("ws://host/realtime");
        assert_eq!(
            transport.url_with_token("a b&c"),
            "ws://host/realtime?token=a%20b%26c"
        );
    }

    #[test]
    fn test_existing_query_string_is_extended() {
        let transport = WebSocketTransport::new("ws://host/realtime?v=2");
        assert_eq!(
            transport.url_with_token("t"),
            "ws://host/realtime?v=2&token=t"
        );
    }

    #[test]
    fn test_empty_token_leaves_url_untouched() {
        let transport = WebSocketTransport::new("ws://host/realtime");
        assert_eq!(transport.url_with_token(""), "ws://host/realtime");
    }
}
