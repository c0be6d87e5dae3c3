//! Socket connection between the router's [`ServerChannel`] and a GLSP server.
//!
//! Envelopes the router fires on `to_server` are queued from the moment the
//! adapter is created and flushed once the server answered `initialize`.
//! Only action envelopes are sent, each as a `process` notification.
//! `process` notifications from the server are fired on `from_server`.

use crate::error::{ServerError, ServerResult};
use crate::jsonrpc::{
    read_message, write_json, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, METHOD_NOT_FOUND,
};
use glsp_bridge_core::{ServerChannel, Subscription};
use glsp_bridge_protocol::is_action_message;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Method carrying action envelopes in both directions.
pub const PROCESS_METHOD: &str = "process";
pub const INITIALIZE_METHOD: &str = "initialize";
pub const SHUTDOWN_METHOD: &str = "shutdown";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifier of this bridge process, sent with `initialize`.
///
/// Generated once and shared by every adapter in the process.
pub fn application_id() -> &'static str {
    static ID: OnceLock<String> = OnceLock::new();
    ID.get_or_init(|| uuid::Uuid::new_v4().to_string())
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, JsonRpcError>>>>>;
type SharedWriter = Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ServerAdapterOptions {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    /// Sent as `args.clientId` with `initialize` when set.
    pub client_id: Option<String>,
    pub client_name: Option<String>,
}

impl ServerAdapterOptions {
    pub fn new(port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            client_id: None,
            client_name: None,
        }
    }

    pub fn with_client(mut self, client_id: impl Into<String>, client_name: Option<String>) -> Self {
        self.client_id = Some(client_id.into());
        self.client_name = client_name;
        self
    }

    fn initialize_params(&self) -> Value {
        let mut params = json!({ "applicationId": application_id() });
        if let Some(client_id) = &self.client_id {
            let mut args = json!({ "clientId": client_id });
            if let Some(client_name) = &self.client_name {
                args["clientName"] = json!(client_name);
            }
            params["args"] = args;
        }
        params
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

struct Connection {
    writer: SharedWriter,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Relays a [`ServerChannel`] over one server connection.
pub struct ServerAdapter {
    channel: ServerChannel,
    options: ServerAdapterOptions,
    outgoing: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
    outgoing_subscription: Mutex<Option<Subscription>>,
    pending: PendingMap,
    next_id: AtomicU64,
    connection: tokio::sync::Mutex<Option<Connection>>,
}

impl ServerAdapter {
    /// Create an adapter and start queueing everything fired on `to_server`.
    pub fn new(channel: ServerChannel, options: ServerAdapterOptions) -> Self {
        let (outgoing, subscription) = channel.to_server.subscribe();
        Self {
            channel,
            options,
            outgoing: Mutex::new(Some(outgoing)),
            outgoing_subscription: Mutex::new(Some(subscription)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            connection: tokio::sync::Mutex::new(None),
        }
    }

    pub fn channel(&self) -> &ServerChannel {
        &self.channel
    }

    /// Connect over TCP and initialize.
    pub async fn start(&self) -> ServerResult<()> {
        let address = self.options.address();
        debug!(address = %address, "Connecting to GLSP server");
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| ServerError::connection_failed(format!("{address}: {e}")))?;
        self.start_with(stream).await
    }

    /// Initialize over an already connected stream.
    pub async fn start_with<S>(&self, stream: S) -> ServerResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut connection = self.connection.lock().await;
        if connection.is_some() {
            return Err(ServerError::connection_failed("Already connected"));
        }

        let (reader, writer) = tokio::io::split(stream);
        let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(Box::new(writer)));
        let cancel = CancellationToken::new();

        let reader_task = tokio::spawn(read_loop(
            reader,
            writer.clone(),
            self.pending.clone(),
            self.channel.clone(),
            cancel.clone(),
        ));

        let params = self.options.initialize_params();
        if let Err(e) = self.request(&writer, INITIALIZE_METHOD, params).await {
            cancel.cancel();
            reader_task.abort();
            return Err(e);
        }
        info!(port = self.options.port, "Connected to GLSP server");

        let outgoing = self
            .outgoing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| ServerError::connection_failed("Adapter was stopped"))?;
        let writer_task = tokio::spawn(write_loop(outgoing, writer.clone(), cancel.clone()));

        *connection = Some(Connection {
            writer,
            cancel,
            tasks: vec![reader_task, writer_task],
        });
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Send `shutdown` and close the connection. Queued envelopes are dropped.
    pub async fn stop(&self) -> ServerResult<()> {
        drop(
            self.outgoing_subscription
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take(),
        );
        self.outgoing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let Some(connection) = self.connection.lock().await.take() else {
            return Ok(());
        };
        connection.cancel.cancel();

        let result = {
            let mut writer = connection.writer.lock().await;
            let notification = JsonRpcNotification::new(SHUTDOWN_METHOD, None);
            match write_json(&mut *writer, &notification).await {
                Ok(()) => writer.shutdown().await.map_err(ServerError::from),
                Err(e) => Err(e),
            }
        };
        for task in connection.tasks {
            task.abort();
        }
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();

        debug!("GLSP server connection closed");
        result
    }

    async fn request(&self, writer: &SharedWriter, method: &str, params: Value) -> ServerResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        let request = JsonRpcRequest::new(id, method, Some(params));
        if let Err(e) = write_json(&mut *writer.lock().await, &request).await {
            self.pending
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.options.request_timeout, rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(ServerError::request_failed(format!(
                "{method}: {}",
                error.message
            ))),
            Ok(Err(_)) => Err(ServerError::connection_failed(
                "Server closed connection",
            )),
            Err(_) => {
                self.pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&id);
                Err(ServerError::Timeout)
            }
        }
    }
}

async fn read_loop<R>(
    reader: ReadHalf<R>,
    writer: SharedWriter,
    pending: PendingMap,
    channel: ServerChannel,
    cancel: CancellationToken,
) where
    R: AsyncRead + Send,
{
    let mut reader = BufReader::new(reader);
    loop {
        let content = tokio::select! {
            _ = cancel.cancelled() => break,
            content = read_message(&mut reader) => content,
        };
        let content = match content {
            Ok(Some(content)) => content,
            Ok(None) => {
                info!("GLSP server closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Reading from GLSP server failed");
                break;
            }
        };

        match IncomingMessage::parse(&content) {
            Ok(IncomingMessage::Response(response)) => {
                let sender = pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&response.id);
                match sender {
                    Some(sender) => {
                        let result = match response.error {
                            Some(error) => Err(error),
                            None => Ok(response.result.unwrap_or(Value::Null)),
                        };
                        let _ = sender.send(result);
                    }
                    None => trace!(id = response.id, "Response for unknown request"),
                }
            }
            Ok(IncomingMessage::Notification(notification)) => {
                if notification.method == PROCESS_METHOD {
                    if let Some(params) = notification.params {
                        channel.from_server.fire(params);
                    }
                } else {
                    debug!(method = %notification.method, "Ignoring server notification");
                }
            }
            Ok(IncomingMessage::Request(request)) => {
                debug!(method = %request.method, "Rejecting server request");
                let response = JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("Unhandled method {}", request.method),
                );
                if let Err(e) = write_json(&mut *writer.lock().await, &response).await {
                    warn!(error = %e, "Failed to answer server request");
                }
            }
            Err(e) => warn!(error = %e, "Discarding malformed server message"),
        }
    }

    // Fail outstanding requests.
    pending.lock().unwrap_or_else(|e| e.into_inner()).clear();
}

async fn write_loop(
    mut outgoing: mpsc::UnboundedReceiver<Value>,
    writer: SharedWriter,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = outgoing.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        if !is_action_message(&message) {
            trace!("Not sending non-action message to GLSP server");
            continue;
        }

        let notification = JsonRpcNotification::new(PROCESS_METHOD, Some(message));
        if let Err(e) = write_json(&mut *writer.lock().await, &notification).await {
            warn!(error = %e, "Writing to GLSP server failed");
            break;
        }
    }
}
