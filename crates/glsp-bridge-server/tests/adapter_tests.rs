//! Adapter behavior against an in-process fake GLSP server.

use glsp_bridge_core::ServerChannel;
use glsp_bridge_server::jsonrpc::{read_message, write_json, JsonRpcNotification};
use glsp_bridge_server::{application_id, ServerAdapter, ServerAdapterOptions, ServerError};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf};

struct FakeServer {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    async fn next(&mut self) -> Value {
        let content = tokio::time::timeout(Duration::from_secs(2), read_message(&mut self.reader))
            .await
            .expect("timed out waiting for the bridge")
            .unwrap()
            .expect("bridge closed the stream");
        serde_json::from_str(&content).unwrap()
    }

    async fn send(&mut self, message: Value) {
        write_json(&mut self.writer, &message).await.unwrap();
    }

    /// Answer the initialize request.
    async fn accept_initialize(&mut self) -> Value {
        let request = self.next().await;
        assert_eq!(request["method"], "initialize");
        self.send(json!({"jsonrpc": "2.0", "id": request["id"], "result": true}))
            .await;
        request
    }
}

fn pair() -> (DuplexStream, FakeServer) {
    let (bridge, server) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(server);
    (
        bridge,
        FakeServer {
            reader: BufReader::new(reader),
            writer,
        },
    )
}

fn adapter() -> Arc<ServerAdapter> {
    Arc::new(ServerAdapter::new(
        ServerChannel::new(),
        ServerAdapterOptions::new(5007),
    ))
}

#[tokio::test]
async fn test_initialize_sends_application_id() {
    let adapter = adapter();
    let (stream, mut server) = pair();

    let start = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.start_with(stream).await })
    };
    let request = server.accept_initialize().await;

    assert_eq!(request["params"], json!({"applicationId": application_id()}));
    start.await.unwrap().unwrap();
    assert!(adapter.is_connected().await);
}

#[tokio::test]
async fn test_messages_before_ready_are_flushed_in_order() {
    let adapter = adapter();
    let (stream, mut server) = pair();

    let first = json!({"clientId": "wf_0", "action": {"kind": "requestModel"}});
    let second = json!({"clientId": "wf_0", "action": {"kind": "changeBounds"}});
    adapter.channel().to_server.fire(first.clone());
    adapter.channel().to_server.fire(json!({"jsonrpc": "2.0", "method": "other"}));
    adapter.channel().to_server.fire(second.clone());

    let start = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.start_with(stream).await })
    };
    server.accept_initialize().await;
    start.await.unwrap().unwrap();

    let a = server.next().await;
    let b = server.next().await;
    assert_eq!(a, json!({"jsonrpc": "2.0", "method": "process", "params": first}));
    // The non-action message was skipped.
    assert_eq!(b["params"], second);
}

#[tokio::test]
async fn test_process_notifications_reach_from_server() {
    let adapter = adapter();
    let (stream, mut server) = pair();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let _sub = adapter
        .channel()
        .from_server
        .on(move |message: &Value| sink.lock().unwrap().push(message.clone()));

    let start = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.start_with(stream).await })
    };
    server.accept_initialize().await;
    start.await.unwrap().unwrap();

    let envelope = json!({"clientId": "wf_0", "action": {"kind": "setModel"}});
    let notification = JsonRpcNotification::new("process", Some(envelope.clone()));
    write_json(&mut server.writer, &notification).await.unwrap();
    server
        .send(json!({"jsonrpc": "2.0", "method": "window/logMessage", "params": {}}))
        .await;

    for _ in 0..100 {
        if !received.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(*received.lock().unwrap(), vec![envelope]);
}

#[tokio::test]
async fn test_server_requests_are_rejected() {
    let adapter = adapter();
    let (stream, mut server) = pair();

    let start = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.start_with(stream).await })
    };
    server.accept_initialize().await;
    start.await.unwrap().unwrap();

    server
        .send(json!({"jsonrpc": "2.0", "id": 77, "method": "client/unknown"}))
        .await;
    let response = server.next().await;
    assert_eq!(response["id"], 77);
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_failed_initialize() {
    let adapter = adapter();
    let (stream, mut server) = pair();

    let start = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.start_with(stream).await })
    };
    let request = server.next().await;
    server
        .send(json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": {"code": -32603, "message": "unsupported client"}
        }))
        .await;

    let err = start.await.unwrap().unwrap_err();
    assert!(matches!(err, ServerError::RequestFailed(ref m) if m.contains("unsupported client")));
    assert!(!adapter.is_connected().await);
}

#[tokio::test]
async fn test_stop_sends_shutdown() {
    let adapter = adapter();
    let (stream, mut server) = pair();

    let start = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.start_with(stream).await })
    };
    server.accept_initialize().await;
    start.await.unwrap().unwrap();

    adapter.stop().await.unwrap();
    let shutdown = server.next().await;
    assert_eq!(shutdown, json!({"jsonrpc": "2.0", "method": "shutdown"}));
    assert!(!adapter.is_connected().await);

    // Nothing is relayed after stop.
    adapter
        .channel()
        .to_server
        .fire(json!({"clientId": "wf_0", "action": {"kind": "fit"}}));
    let end = read_message(&mut server.reader).await.unwrap();
    assert!(end.is_none());
}

#[tokio::test]
async fn test_start_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (reader, writer) = tokio::io::split(socket);
        let mut reader = BufReader::new(reader);
        let mut writer = writer;
        let content = read_message(&mut reader).await.unwrap().unwrap();
        let request: Value = serde_json::from_str(&content).unwrap();
        write_json(
            &mut writer,
            &json!({"jsonrpc": "2.0", "id": request["id"], "result": null}),
        )
        .await
        .unwrap();
        let content = read_message(&mut reader).await.unwrap().unwrap();
        serde_json::from_str::<Value>(&content).unwrap()
    });

    let adapter = ServerAdapter::new(ServerChannel::new(), ServerAdapterOptions::new(port));
    adapter.start().await.unwrap();
    adapter
        .channel()
        .to_server
        .fire(json!({"clientId": "wf_0", "action": {"kind": "layout"}}));

    let relayed = tokio::time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(relayed["params"]["action"]["kind"], "layout");
}

#[tokio::test]
async fn test_start_without_server() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let adapter = ServerAdapter::new(ServerChannel::new(), ServerAdapterOptions::new(port));
    let err = adapter.start().await.unwrap_err();
    assert!(matches!(err, ServerError::ConnectionFailed(_)));
}
