//! Loopback tests for the WebSocket push transport.
//!
//! Each test runs a one-connection tungstenite server on `127.0.0.1:0` and
//! drives the real `WebSocketTransport` against it, covering the handshake
//! (including the token query parameter), both frame directions, and close
//! code mapping.

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, accept_hdr_async};

use crate::transport::{PushEvent, PushTransport, WebSocketTransport};

#[tokio::test]
async fn test_connect_exchanges_frames_and_carries_token() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let (uri_tx, mut uri_rx) = mpsc::unbounded_channel();
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |request: &Request, response: Response| {
            let _ = uri_tx.send(request.uri().to_string());
            Ok(response)
        };
        let mut server = accept_hdr_async(stream, callback).await.unwrap();

        server
            .send(Message::Text(r#"{"type":"system_alert"}"#.to_string()))
            .await
            .unwrap();

        // Drain until the client's close so its final frames never hit a
        // torn-down socket.
        while let Some(message) = server.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let _ = frame_tx.send(text);
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    let transport = WebSocketTransport::new(format!("ws://{address}/realtime"));
    let (mut sink, mut stream) = transport.connect("s3cr3t").await.unwrap();

    assert_eq!(uri_rx.recv().await.unwrap(), "/realtime?token=s3cr3t");

    match stream.next_event().await {
        Some(Ok(PushEvent::Text(text))) => {
            assert_eq!(text, r#"{"type":"system_alert"}"#);
        }
        other => panic!("expected a text event, got {other:?}"),
    }

    sink.send_text(r#"{"type":"request_update"}"#.to_string())
        .await
        .unwrap();
    assert_eq!(
        frame_rx.recv().await.unwrap(),
        r#"{"type":"request_update"}"#
    );

    sink.close(1000).await.unwrap();
}

#[tokio::test]
async fn test_server_close_code_surfaces_to_the_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = accept_async(stream).await.unwrap();
        server
            .close(Some(CloseFrame {
                code: CloseCode::from(1011),
                reason: "server restarting".into(),
            }))
            .await
            .unwrap();
    });

    let transport = WebSocketTransport::new(format!("ws://{address}/realtime"));
    let (_sink, mut stream) = transport.connect("").await.unwrap();

    match stream.next_event().await {
        Some(Ok(PushEvent::Closed { code })) => assert_eq!(code, 1011),
        other => panic!("expected a close event, got {other:?}"),
    }
}
