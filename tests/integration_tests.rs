//! End-to-end tests — real listeners on OS-assigned ports, driven over raw
//! TCP (newline-delimited JSON) and HTTP.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tether::ChatHandler;
use tether_server::{ControllerConfig, ControllerEnv, ControllerPool, Dispatcher, PoolConfig};
use tether_transport::{JsonLineCodec, LocalRuntime, TransportConfig, TransportServer};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

/// Start a server with the chat handler; returns `(tcp_port, http_port)`.
async fn start_test_server(debug: bool) -> (u16, u16) {
    start_test_server_with_frame_limit(debug, TransportConfig::default().max_frame_len).await
}

async fn start_test_server_with_frame_limit(debug: bool, max_frame_len: usize) -> (u16, u16) {
    let runtime = Arc::new(LocalRuntime::new());
    let env = ControllerEnv::new(runtime.clone(), Arc::new(JsonLineCodec::default()))
        .with_config(ControllerConfig {
            debug,
            capture: false,
        });
    let mut dispatcher = Dispatcher::new(ControllerPool::new(Arc::new(env), PoolConfig::default()));
    dispatcher.register_handler(ChatHandler);

    let config = TransportConfig {
        tcp_port: 0,
        http_port: 0,
        max_connections: Some(16),
        max_frame_len,
        ..Default::default()
    };
    let transport = TransportServer::start(config, runtime, Arc::new(dispatcher))
        .await
        .unwrap();
    let ports = (transport.tcp_port(), transport.http_port());

    // Leak the transport to keep it running for the test
    Box::leak(Box::new(transport));

    ports
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("Failed to connect");
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    async fn send(&mut self, frame: Value) {
        let mut line = serde_json::to_vec(&frame).unwrap();
        line.push(b'\n');
        self.writer.write_all(&line).await.unwrap();
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let mut line = String::new();
        let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("Timeout waiting for frame")
            .expect("Read failed");
        assert!(n > 0, "Connection closed while waiting for a frame");
        serde_json::from_str(line.trim_end()).unwrap()
    }

    /// Wait for the server to close the connection.
    async fn expect_closed(&mut self) {
        let mut line = String::new();
        let n = timeout(Duration::from_secs(5), self.reader.read_line(&mut line))
            .await
            .expect("Timeout waiting for close")
            .unwrap_or(0);
        assert_eq!(n, 0, "Expected EOF, got {line:?}");
    }

    async fn call(&mut self, frame: Value) -> Value {
        self.send(frame).await;
        self.recv().await
    }

    async fn login(&mut self, user: u64) {
        let resp = self.call(json!({"route": "chat/login", "user": user})).await;
        assert_eq!(resp, json!({"ok": true, "user": user}));
    }
}

fn http_url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}{path}")
}

// ─────────────────────────────────────────────────────────────────────────────
// TCP
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tcp_whoami_plain() {
    let (tcp, _) = start_test_server(false).await;
    let mut client = Client::connect(tcp).await;

    let resp = client.call(json!({"route": "chat/whoami"})).await;
    assert_eq!(resp["transport"], "tcp");
    assert_eq!(resp["user"], Value::Null);
    assert_eq!(resp["rpc"], false);
    assert!(resp["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_tcp_rpc_reply_is_wrapped() {
    let (tcp, _) = start_test_server(false).await;
    let mut client = Client::connect(tcp).await;

    let resp = client
        .call(json!({"route": "chat/whoami", "rpc_request_id": "R9", "rpc_token": "T1"}))
        .await;
    assert_eq!(resp["rpc_token"], "T1");
    assert_eq!(resp["rpc_result"]["rpc"], true);
    assert_eq!(resp["rpc_result"]["correlation_id"], "R9");
}

#[tokio::test]
async fn test_tcp_rpc_state_does_not_leak_into_next_frame() {
    let (tcp, _) = start_test_server(false).await;
    let mut client = Client::connect(tcp).await;

    let first = client
        .call(json!({"route": "chat/whoami", "rpc_request_id": "R1", "rpc_token": "T1"}))
        .await;
    assert_eq!(first["rpc_token"], "T1");

    let second = client.call(json!({"route": "chat/whoami"})).await;
    assert!(second.get("rpc_token").is_none());
    assert_eq!(second["rpc"], false);
    assert_ne!(second["correlation_id"], "R1");
}

#[tokio::test]
async fn test_tcp_group_chat() {
    let (tcp, _) = start_test_server(false).await;
    let mut alice = Client::connect(tcp).await;
    let mut bob = Client::connect(tcp).await;
    alice.login(1).await;
    bob.login(2).await;

    assert_eq!(alice.call(json!({"route": "chat/join", "group": 7})).await, json!({"joined": 7}));
    assert_eq!(bob.call(json!({"route": "chat/join", "group": 7})).await, json!({"joined": 7}));

    alice
        .send(json!({"route": "chat/say", "group": 7, "text": "hello"}))
        .await;
    let event = json!({"event": "message", "group": 7, "from": 1, "text": "hello"});
    // The group send goes out before the reply.
    assert_eq!(alice.recv().await, event);
    assert_eq!(alice.recv().await, json!({"sent": true}));
    assert_eq!(bob.recv().await, event);
}

#[tokio::test]
async fn test_tcp_whisper() {
    let (tcp, _) = start_test_server(false).await;
    let mut alice = Client::connect(tcp).await;
    let mut bob = Client::connect(tcp).await;
    alice.login(1).await;
    bob.login(2).await;

    let resp = alice
        .call(json!({"route": "chat/whisper", "to": 2, "text": "psst"}))
        .await;
    assert_eq!(resp, json!({"sent": true}));
    assert_eq!(
        bob.recv().await,
        json!({"event": "whisper", "from": 1, "text": "psst"})
    );
}

#[tokio::test]
async fn test_tcp_login_kicks_previous_connection() {
    let (tcp, _) = start_test_server(false).await;
    let mut first = Client::connect(tcp).await;
    let mut second = Client::connect(tcp).await;
    first.login(5).await;
    second.login(5).await;

    first.expect_closed().await;
    let resp = second.call(json!({"route": "chat/whoami"})).await;
    assert_eq!(resp["user"], 5);
}

#[tokio::test]
async fn test_tcp_quit_closes_connection() {
    let (tcp, _) = start_test_server(false).await;
    let mut client = Client::connect(tcp).await;

    client.send(json!({"route": "chat/quit"})).await;
    client.expect_closed().await;
}

#[tokio::test]
async fn test_tcp_unknown_method_is_reported() {
    let (tcp, _) = start_test_server(true).await;
    let mut client = Client::connect(tcp).await;

    let resp = client.call(json!({"route": "chat/nope"})).await;
    assert_eq!(resp, json!("method not found: chat/nope"));
    let resp = client.call(json!({"route": "other/thing"})).await;
    assert_eq!(resp, json!("method not found: other/thing"));
}

#[tokio::test]
async fn test_tcp_fault_is_generic_without_debug() {
    let (tcp, _) = start_test_server(false).await;
    let mut client = Client::connect(tcp).await;

    assert_eq!(client.call(json!({"route": "chat/boom"})).await, json!("error"));
    assert_eq!(client.call(json!({"route": "chat/nope"})).await, json!("error"));
}

#[tokio::test]
async fn test_tcp_malformed_frames_are_skipped() {
    let (tcp, _) = start_test_server(false).await;
    let mut client = Client::connect(tcp).await;

    client.send_raw("this is not json\n").await;
    client.send_raw("{\"no_route\": true}\n").await;
    client.send_raw("\n").await;
    let resp = client.call(json!({"route": "chat/whoami"})).await;
    assert_eq!(resp["transport"], "tcp");
}

#[tokio::test]
async fn test_tcp_oversized_frame_without_newline_closes_connection() {
    let (tcp, _) = start_test_server_with_frame_limit(false, 1024).await;
    let mut client = Client::connect(tcp).await;

    // The server may hang up mid-write; only the close matters here.
    let _ = client.writer.write_all(&vec![b'x'; 64 * 1024]).await;
    client.expect_closed().await;
}

#[tokio::test]
async fn test_tcp_frame_at_the_limit_is_accepted() {
    let (tcp, _) = start_test_server_with_frame_limit(false, 1024).await;
    let mut client = Client::connect(tcp).await;

    let frame = json!({"route": "chat/whoami", "pad": "y".repeat(900)});
    let resp = client.call(frame).await;
    assert_eq!(resp["transport"], "tcp");
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_http_health() {
    let (_, http) = start_test_server(false).await;
    let resp: Value = reqwest::get(http_url(http, "/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["status"], "ok");
}

#[tokio::test]
async fn test_http_whoami() {
    let (_, http) = start_test_server(false).await;
    let resp = reqwest::get(http_url(http, "/chat/whoami")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["transport"], "http");
    assert_eq!(body["rpc"], false);
    assert_eq!(body["connection"], Value::Null);
}

#[tokio::test]
async fn test_http_rpc_request_id_header() {
    let (_, http) = start_test_server(false).await;
    let body: Value = reqwest::Client::new()
        .get(http_url(http, "/chat/whoami"))
        .header("rpc_request_id", "H7")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["rpc"], true);
    assert_eq!(body["correlation_id"], "H7");
}

#[tokio::test]
async fn test_http_unknown_operation_is_not_found() {
    let (_, http) = start_test_server(false).await;
    for path in ["/chat/nope", "/nothing/here"] {
        let resp = reqwest::get(http_url(http, path)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        let body = resp.text().await.unwrap();
        assert!(body.contains("404 Not Found"), "unexpected body: {body}");
    }
}

#[tokio::test]
async fn test_http_fault_is_sent_as_body() {
    let (_, http) = start_test_server(true).await;
    let resp = reqwest::get(http_url(http, "/chat/boom")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "boom requested");
}

#[tokio::test]
async fn test_http_tcp_only_operation_faults() {
    let (_, http) = start_test_server(false).await;
    let resp = reqwest::Client::new()
        .post(http_url(http, "/chat/login"))
        .body(r#"{"user": 3}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "error");
}
