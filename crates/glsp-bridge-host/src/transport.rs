//! Host transport layer.
//!
//! Implements newline-delimited JSON (ndjson) transport for communication
//! with the host editor. The bridge runs it over stdin/stdout; tests run it
//! over in-memory pipes.

use crate::error::TransportError;
use crate::types::{JsonRpcError, JsonRpcId, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Message from the host.
#[derive(Debug)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Pending request awaiting response.
struct PendingRequest {
    sender: oneshot::Sender<Result<Value, JsonRpcError>>,
}

type PendingMap = Arc<Mutex<HashMap<JsonRpcId, PendingRequest>>>;

/// ndjson JSON-RPC transport. Clones share the connection.
#[derive(Clone)]
pub struct Transport {
    /// Sender for outgoing messages. Unbounded so that event callbacks can
    /// send without awaiting.
    outgoing_tx: mpsc::UnboundedSender<String>,
    /// Pending requests awaiting responses.
    pending: PendingMap,
    /// Next request ID.
    next_id: Arc<AtomicI64>,
    request_timeout: Duration,
}

impl Transport {
    /// Create a transport over stdin/stdout and start the I/O loops.
    pub fn stdio() -> (Self, mpsc::Receiver<IncomingMessage>) {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    /// Create a transport over any byte streams and start the I/O loops.
    pub fn new<R, W>(reader: R, writer: W) -> (Self, mpsc::Receiver<IncomingMessage>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel::<String>();
        let (incoming_tx, incoming_rx) = mpsc::channel::<IncomingMessage>(100);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // Start reader task
        let pending_clone = pending.clone();
        tokio::spawn(async move {
            Self::read_loop(reader, incoming_tx, pending_clone).await;
        });

        // Start writer task
        tokio::spawn(async move {
            Self::write_loop(writer, outgoing_rx).await;
        });

        let transport = Self {
            outgoing_tx,
            pending,
            next_id: Arc::new(AtomicI64::new(1)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };

        (transport, incoming_rx)
    }

    /// Override how long [`Transport::send_request`] waits for an answer.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Read lines and dispatch messages.
    async fn read_loop<R>(
        reader: R,
        incoming_tx: mpsc::Sender<IncomingMessage>,
        pending: PendingMap,
    ) where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    debug!("Received: {}", line);

                    let value: Value = match serde_json::from_str(&line) {
                        Ok(value) => value,
                        Err(e) => {
                            warn!(error = %e, "Failed to parse message: {}", line);
                            continue;
                        }
                    };

                    let message = if value.get("method").is_none() {
                        Self::complete_request(&pending, value);
                        continue;
                    } else if value.get("id").is_some_and(|id| !id.is_null()) {
                        serde_json::from_value(value).map(IncomingMessage::Request)
                    } else {
                        serde_json::from_value(value).map(IncomingMessage::Notification)
                    };

                    match message {
                        Ok(message) => {
                            if let Err(e) = incoming_tx.send(message).await {
                                error!("Failed to dispatch message: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "Malformed message: {}", line),
                    }
                }
                Ok(None) => {
                    info!("Host input closed");
                    break;
                }
                Err(e) => {
                    error!("Error reading host input: {}", e);
                    break;
                }
            }
        }

        // Fail requests that can no longer be answered.
        pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn complete_request(pending: &PendingMap, value: Value) {
        let response: JsonRpcResponse = match serde_json::from_value(value) {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Discarding invalid response");
                return;
            }
        };

        let request = pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&response.id);
        match request {
            Some(request) => {
                let result = match response.error {
                    Some(error) => Err(error),
                    None => Ok(response.result.unwrap_or(Value::Null)),
                };
                let _ = request.sender.send(result);
            }
            None => debug!(id = ?response.id, "Response for unknown request"),
        }
    }

    /// Write messages, one per line.
    async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>)
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(msg) = rx.recv().await {
            debug!("Sending: {}", msg);
            if let Err(e) = writer.write_all(msg.as_bytes()).await {
                error!("Error writing to host: {}", e);
                break;
            }
            if let Err(e) = writer.write_all(b"\n").await {
                error!("Error writing newline: {}", e);
                break;
            }
            if let Err(e) = writer.flush().await {
                error!("Error flushing host output: {}", e);
                break;
            }
        }
    }

    fn send_line<T: Serialize>(&self, message: &T) -> Result<(), TransportError> {
        let json = serde_json::to_string(message)?;
        self.outgoing_tx
            .send(json)
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Send a response to a request.
    pub fn send_response(
        &self,
        id: JsonRpcId,
        result: Result<Value, JsonRpcError>,
    ) -> Result<(), TransportError> {
        let response = JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id,
            result: result.as_ref().ok().cloned(),
            error: result.err(),
        };
        self.send_line(&response)
    }

    /// Send a notification (no response expected).
    pub fn send_notification(&self, method: &str, params: Value) -> Result<(), TransportError> {
        let notification = JsonRpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: Some(params),
        };
        self.send_line(&notification)
    }

    /// Serialize `params` and send them as a notification. Failures are
    /// logged; used from event callbacks that cannot report errors.
    pub fn notify<T: Serialize>(&self, method: &str, params: &T) {
        let result = serde_json::to_value(params)
            .map_err(TransportError::from)
            .and_then(|params| self.send_notification(method, params));
        if let Err(e) = result {
            warn!(method, error = %e, "Failed to notify host");
        }
    }

    /// Send a request and wait for response.
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = JsonRpcId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.clone(), PendingRequest { sender: tx });

        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(id.clone()),
            method: method.to_string(),
            params: Some(params),
        };
        if let Err(e) = self.send_line(&request) {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            return Err(e);
        }

        // Wait for response with timeout
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result.map_err(TransportError::Remote),
            Ok(Err(_)) => Err(TransportError::ChannelClosed),
            Err(_) => {
                // Remove pending request
                self.pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                Err(TransportError::Timeout)
            }
        }
    }
}
