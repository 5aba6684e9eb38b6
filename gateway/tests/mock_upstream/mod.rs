//! Mock OpenAI Realtime upstream and gateway harness
//!
//! The mock records every frame it receives, counts connection attempts and
//! can delay its handshake, greet the client, or close or drop the
//! connection after configuration.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_hdr_async};

use veritas_gateway::config::{RealtimeSettings, ServerConfig};
use veritas_gateway::{AppState, routes};

pub const TEST_API_KEY: &str = "sk-test-mock";

/// What the mock does once the session configuration arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Only record
    Quiet,
    /// Send `session.created`, an error event and one audio chunk
    Greet,
    /// Send a close frame
    CloseAfterConfig,
    /// Drop the TCP stream without a closing handshake
    ResetAfterConfig,
}

/// A frame as seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Json(Value),
    Text(String),
    Binary(Vec<u8>),
}

impl Received {
    pub fn json(&self) -> &Value {
        match self {
            Received::Json(value) => value,
            other => panic!("Expected JSON frame, got {other:?}"),
        }
    }

    pub fn event_type(&self) -> Option<&str> {
        match self {
            Received::Json(value) => value["type"].as_str(),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct MockRecord {
    pub frames: Mutex<Vec<Received>>,
    pub headers: Mutex<Vec<(String, String)>>,
    pub connections: AtomicUsize,
    pub client_closed: AtomicBool,
}

impl MockRecord {
    pub fn frames(&self) -> Vec<Received> {
        self.frames.lock().unwrap().clone()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .lock()
            .unwrap()
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn saw_close(&self) -> bool {
        self.client_closed.load(Ordering::SeqCst)
    }
}

pub struct MockUpstream {
    pub url: String,
    pub record: Arc<MockRecord>,
}

/// Start a mock that waits `handshake_delay` before answering each upgrade.
pub async fn spawn_mock_upstream(behavior: Behavior, handshake_delay: Duration) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let record = Arc::new(MockRecord::default());

    let accept_record = record.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            accept_record.connections.fetch_add(1, Ordering::SeqCst);
            let record = accept_record.clone();
            tokio::spawn(async move {
                tokio::time::sleep(handshake_delay).await;
                let _ = handle_connection(stream, behavior, record).await;
            });
        }
    });

    MockUpstream {
        url: format!("ws://{addr}/v1/realtime"),
        record,
    }
}

async fn handle_connection(
    stream: TcpStream,
    behavior: Behavior,
    record: Arc<MockRecord>,
) -> Result<(), tungstenite::Error> {
    let header_record = record.clone();
    let ws = accept_hdr_async(stream, move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let mut headers = header_record.headers.lock().unwrap();
        for (name, value) in request.headers() {
            headers.push((
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            ));
        }
        Ok(response)
    })
    .await?;
    let (mut write, mut read) = ws.split();

    while let Some(message) = read.next().await {
        let message = match message {
            Ok(message) => message,
            Err(_) => break,
        };

        let received = match message {
            Message::Text(text) => match serde_json::from_str::<Value>(text.as_str()) {
                Ok(value) => Received::Json(value),
                Err(_) => Received::Text(text.to_string()),
            },
            Message::Binary(data) => Received::Binary(data.to_vec()),
            Message::Close(_) => break,
            _ => continue,
        };

        let is_config = received.event_type() == Some("session.update");
        record.frames.lock().unwrap().push(received);

        if is_config {
            match behavior {
                Behavior::Quiet => {}
                Behavior::Greet => {
                    let created = json!({"type": "session.created", "session": {"id": "sess_mock"}});
                    write.send(Message::Text(created.to_string().into())).await?;
                    let error = json!({
                        "type": "error",
                        "event_id": "evt_1",
                        "error": {
                            "type": "invalid_request_error",
                            "code": "mock_code",
                            "message": "Mock upstream error",
                        }
                    });
                    write.send(Message::Text(error.to_string().into())).await?;
                    write
                        .send(Message::Binary(Bytes::from_static(&[1, 0, 2, 0])))
                        .await?;
                }
                Behavior::CloseAfterConfig => {
                    write.send(Message::Close(None)).await?;
                }
                Behavior::ResetAfterConfig => return Ok(()),
            }
        }
    }

    record.client_closed.store(true, Ordering::SeqCst);
    Ok(())
}

/// Gateway configuration pointing at `upstream_url`.
pub fn gateway_config(upstream_url: &str, handshake_timeout_ms: u64) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        openai_api_key: Some(TEST_API_KEY.to_string()),
        realtime: RealtimeSettings {
            url: upstream_url.to_string(),
            handshake_timeout_ms,
            ..RealtimeSettings::default()
        },
        posts_path: None,
        log_payloads: true,
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 100000,
        rate_limit_burst_size: 100,
        max_websocket_connections: None,
        max_connections_per_ip: 1000,
    }
}

/// Serve the full router on an ephemeral port.
pub async fn spawn_gateway(config: ServerConfig) -> (SocketAddr, Arc<AppState>) {
    let state = AppState::new(config).unwrap();
    let app = routes::create_app_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state)
}

pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn connect_client(addr: SocketAddr, query: &str) -> ClientSocket {
    let url = format!("ws://{addr}/ws/voice{query}");
    let (socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    socket
}

/// Next frame from the gateway, failing the test after five seconds.
pub async fn next_message(socket: &mut ClientSocket) -> Message {
    tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("timed out waiting for gateway frame")
        .expect("gateway stream ended")
        .expect("gateway socket error")
}

/// Poll `condition` until it holds, failing the test after `limit`.
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + limit;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {limit:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
