//! Test helpers for supervisor integration tests.
//!
//! - Starting a supervisor on an ephemeral port
//! - Raw line clients and web-socket clients
//! - Handshake shortcuts

use relay_core::config::ServerConfig;
use relay_core::envelope::digest_hex;
use relay_core::supervisor::{self, SupervisorHandle};

use common::RedactedToken;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub const TEST_TOKEN: &str = "test-token-12345";

/// Upper bound for anything the server should answer.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait before concluding nothing is coming.
pub const SILENCE: Duration = Duration::from_millis(300);

pub fn test_config() -> ServerConfig {
    ServerConfig {
        ip: "127.0.0.1".to_string(),
        port: 0,
        token: RedactedToken::new(TEST_TOKEN),
        ..ServerConfig::default()
    }
}

/// Start a supervisor on an ephemeral port.
pub async fn start_server(config: ServerConfig) -> (SupervisorHandle, SocketAddr) {
    let handle = supervisor::start(config)
        .await
        .expect("Failed to start supervisor");
    let addr = handle.local_addr().expect("Supervisor not bound");
    (handle, addr)
}

/// Poll until the listener moved away from `previous`.
pub async fn wait_for_rebind(handle: &SupervisorHandle, previous: SocketAddr) -> SocketAddr {
    tokio::time::timeout(REPLY_TIMEOUT, async {
        loop {
            if let Some(addr) = handle.local_addr() {
                if addr != previous {
                    return addr;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Supervisor did not rebind")
}

/// Poll until the supervisor holds (or no longer holds) a connection.
pub async fn wait_for_connected(handle: &SupervisorHandle, connected: bool) {
    tokio::time::timeout(REPLY_TIMEOUT, async {
        while handle.is_connected().await != connected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Connection state did not change");
}

pub fn auth_request(id: &str, token: &str) -> String {
    format!(
        r#"{{"id":"{id}","method":"authorization","params":["{}"]}}"#,
        digest_hex(token)
    )
}

pub fn upgrade_request(id: &str) -> String {
    format!(r#"{{"id":"{id}","method":"upgrade duplex"}}"#)
}

pub fn parse(line: &str) -> Value {
    serde_json::from_str(line).expect("Reply is not JSON")
}

// ============================================
// RAW CLIENT
// ============================================

/// `\r\n`-terminated line client.
pub struct RawClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl RawClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Failed to connect raw client");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    pub async fn send(&mut self, line: &str) {
        self.send_bytes(format!("{line}\r\n").as_bytes()).await;
    }

    /// Write bytes as-is, terminator included.
    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.writer
            .write_all(bytes)
            .await
            .expect("Failed to write bytes");
    }

    /// Next line, or `None` once the server closed the stream.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(REPLY_TIMEOUT, self.lines.next_line())
            .await
            .expect("Timed out waiting for a line")
            .unwrap_or(None)
    }

    pub async fn recv_json(&mut self) -> Value {
        parse(&self.recv().await.expect("Connection closed"))
    }

    /// `true` if nothing arrives within [`SILENCE`].
    pub async fn is_silent(&mut self) -> bool {
        tokio::time::timeout(SILENCE, self.lines.next_line())
            .await
            .is_err()
    }

    pub async fn request(&mut self, line: &str) -> Value {
        self.send(line).await;
        self.recv_json().await
    }

    /// Run the two-step handshake; panics unless both steps succeed.
    pub async fn handshake(&mut self, token: &str) {
        let authorized = self.request(&auth_request("1", token)).await;
        assert_eq!(authorized["result"], "authorized");
        let upgraded = self.request(&upgrade_request("2")).await;
        assert_eq!(upgraded["result"], "upgraded");
    }
}

// ============================================
// WEB-SOCKET CLIENT
// ============================================

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn connect_ws(addr: SocketAddr) -> WsStream {
    let (ws_stream, _) = connect_async(format!("ws://{addr}"))
        .await
        .expect("Failed to connect to WebSocket server");
    ws_stream
}

pub async fn ws_send(ws: &mut WsStream, line: &str) {
    ws.send(Message::Text(line.to_owned().into()))
        .await
        .expect("Failed to send message");
}

/// Next text frame, or `None` once the server closed.
pub async fn ws_recv(ws: &mut WsStream) -> Option<String> {
    let next = tokio::time::timeout(REPLY_TIMEOUT, ws.next())
        .await
        .expect("Timed out waiting for a frame");
    match next {
        Some(Ok(Message::Text(text))) => Some(text.as_str().to_owned()),
        Some(Ok(Message::Close(_))) | None | Some(Err(_)) => None,
        Some(Ok(other)) => panic!("Unexpected frame: {other:?}"),
    }
}

pub async fn ws_request(ws: &mut WsStream, line: &str) -> Value {
    ws_send(ws, line).await;
    parse(&ws_recv(ws).await.expect("Connection closed"))
}
