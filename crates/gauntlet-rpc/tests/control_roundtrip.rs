//! End-to-end exercises of the control server over real sockets.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gauntlet_rpc::{ControlHandler, ControlResponse, RpcClient, RpcServer};

/// Records every dispatched kind and answers a small fixed vocabulary.
struct RecordingHandler {
    calls: Mutex<Vec<String>>,
}

impl RecordingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl ControlHandler for RecordingHandler {
    fn handle(&self, kind: &str, payload: &Value) -> Result<Option<Value>, String> {
        self.calls.lock().push(kind.to_string());
        match kind {
            "PING" => Ok(Some(json!({"pong": true}))),
            "ECHO" => Ok(Some(payload.clone())),
            "BOOM" => Err("kaboom".to_string()),
            "DISCONNECT" | "RECONNECT" | "PAUSE" => Ok(None),
            other => Err(format!("unknown_type: {other}")),
        }
    }
}

async fn start_server(
    handler: Arc<RecordingHandler>,
) -> (SocketAddr, CancellationToken, JoinHandle<()>) {
    let token = CancellationToken::new();
    let server = RpcServer::bind(
        "127.0.0.1:0".parse().unwrap(),
        handler,
        token.clone(),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    let task = tokio::spawn(server.run());
    (addr, token, task)
}

async fn raw_exchange(addr: SocketAddr, frame: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(frame).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply).await.unwrap();
    reply
}

#[tokio::test]
async fn test_ping_roundtrip() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler.clone()).await;

    let client = RpcClient::new(addr);
    let response = client.request("ping", json!({})).await.unwrap();

    assert!(response.ok);
    assert_eq!(response.data, Some(json!({"pong": true})));
    assert!(response.request_id.is_some());
    assert_eq!(handler.calls(), vec!["PING"]);
    token.cancel();
}

#[tokio::test]
async fn test_payload_reaches_handler() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler).await;

    let client = RpcClient::new(addr);
    let response = client
        .request("echo", json!({"case_id": "2.1.1"}))
        .await
        .unwrap();

    assert_eq!(response.data, Some(json!({"case_id": "2.1.1"})));
    token.cancel();
}

#[tokio::test]
async fn test_invalid_json_then_server_still_serves() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler).await;

    let reply = raw_exchange(addr, b"{bad\n").await;
    let parsed: ControlResponse = serde_json::from_slice(&reply).unwrap();
    assert!(!parsed.ok);
    assert!(parsed.error.unwrap().contains("invalid_request"));

    // The accept loop must survive the bad frame.
    let client = RpcClient::new(addr);
    assert!(client.ping().await.unwrap());
    token.cancel();
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler).await;

    let frame = br#"{"request_id":"r-42","type":"ping","payload":{}}"#;
    let mut framed = frame.to_vec();
    framed.push(b'\n');
    let reply = raw_exchange(addr, &framed).await;

    let parsed: ControlResponse = serde_json::from_slice(&reply).unwrap();
    assert_eq!(parsed.request_id.as_deref(), Some("r-42"));
    token.cancel();
}

#[tokio::test]
async fn test_handler_failure_becomes_error_envelope() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler).await;

    let client = RpcClient::new(addr);
    let response = client.request("boom", json!({})).await.unwrap();

    assert!(!response.ok);
    assert_eq!(response.error.as_deref(), Some("kaboom"));
    token.cancel();
}

#[tokio::test]
async fn test_unknown_type_reported_uppercased() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler).await;

    let client = RpcClient::new(addr);
    let response = client.request("nope", json!({})).await.unwrap();

    assert!(!response.ok);
    assert_eq!(response.error.as_deref(), Some("unknown_type: NOPE"));
    token.cancel();
}

#[tokio::test]
async fn test_legacy_verb_gets_bare_ok() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler.clone()).await;

    let client = RpcClient::new(addr);
    let reply = client.legacy("disconnect").await.unwrap();

    assert_eq!(reply, "OK");
    assert_eq!(handler.calls(), vec!["DISCONNECT"]);
    token.cancel();
}

#[tokio::test]
async fn test_unknown_legacy_verb_still_acknowledged() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler.clone()).await;

    let reply = raw_exchange(addr, b"SELF_DESTRUCT\n").await;

    assert_eq!(reply, b"OK");
    assert!(handler.calls().is_empty());
    token.cancel();
}

#[tokio::test]
async fn test_blank_frame_closed_without_reply() {
    let handler = RecordingHandler::new();
    let (addr, token, _task) = start_server(handler).await;

    let reply = raw_exchange(addr, b"   \n").await;
    assert!(reply.is_empty());
    token.cancel();
}

#[tokio::test]
async fn test_shutdown_stops_accept_loop() {
    let handler = RecordingHandler::new();
    let (_addr, token, task) = start_server(handler).await;

    token.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(1), task)
        .await
        .expect("server task should stop after cancellation")
        .unwrap();
}
