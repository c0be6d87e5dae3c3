//! The host bridge: serves the host editor's requests with a [`Router`].

use async_trait::async_trait;
use glsp_bridge_core::{
    serialize_uri, ClientIdGenerator, DiagramDocument, DiagramEditorProvider, DisposableStore,
    DocumentEdit, DocumentId, EditorProviderWrapper, GlspClient, PanelFocusTracker, Router,
    WebviewPanel,
};
use glsp_bridge_protocol::DiagramIdentifier;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::commands::EditorCommand;
use crate::transport::{IncomingMessage, Transport};
use crate::types::{
    methods, parse_params, BackupResult, DestinationParams, DocumentParams, ExecuteCommandParams,
    ExecuteCommandResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest, OpenDocumentParams,
    OpenDocumentResult, PanelParams, PublishDiagnosticsParams, ResolveEditorResult,
    SelectionChangedParams, SetContextParams, ViewStateParams, WebviewMessageParams,
    EDITOR_FOCUSED_CONTEXT, SELECTED_ELEMENTS_CONTEXT,
};
use crate::webview::WebviewEndpoint;

/// Editor provider for documents whose content the server persists.
struct ServerPersistedProvider {
    diagram_type: String,
}

#[async_trait]
impl DiagramEditorProvider for ServerPersistedProvider {
    fn diagram_type(&self) -> &str {
        &self.diagram_type
    }
}

struct BridgeInner {
    router: Router,
    transport: Transport,
    editor: EditorProviderWrapper<ServerPersistedProvider>,
    ids: ClientIdGenerator,
    documents: Mutex<HashMap<DocumentId, DiagramDocument>>,
    endpoints: Mutex<HashMap<String, WebviewEndpoint>>,
    /// Latest edit per document, the target of undo/redo.
    edits: Mutex<HashMap<DocumentId, DocumentEdit>>,
    selection: Mutex<Vec<String>>,
    focus: PanelFocusTracker,
    subscriptions: DisposableStore,
}

/// Serves one host editor connection.
#[derive(Clone)]
pub struct HostBridge {
    inner: Arc<BridgeInner>,
}

impl HostBridge {
    pub fn new(router: Router, transport: Transport, diagram_type: impl Into<String>) -> Self {
        let diagram_type = diagram_type.into();
        let inner = Arc::new(BridgeInner {
            editor: EditorProviderWrapper::new(
                ServerPersistedProvider {
                    diagram_type: diagram_type.clone(),
                },
                router.clone(),
            ),
            router,
            transport,
            ids: ClientIdGenerator::new(diagram_type),
            documents: Mutex::new(HashMap::new()),
            endpoints: Mutex::new(HashMap::new()),
            edits: Mutex::new(HashMap::new()),
            selection: Mutex::new(Vec::new()),
            focus: PanelFocusTracker::new(),
            subscriptions: DisposableStore::new(),
        });

        let transport = inner.transport.clone();
        inner
            .subscriptions
            .add(inner.router.on_diagnostics_changed(move |change| {
                let params = PublishDiagnosticsParams {
                    uri: change.uri.clone(),
                    diagnostics: change.diagnostics.clone(),
                };
                transport.notify(methods::DIAGNOSTICS_PUBLISH, &params);
            }));

        let weak = Arc::downgrade(&inner);
        inner
            .subscriptions
            .add(inner.router.on_selection_changed(move |selected| {
                if let Some(inner) = weak.upgrade() {
                    *inner.selection.lock().unwrap_or_else(|e| e.into_inner()) = selected.clone();
                    inner.transport.notify(
                        methods::SELECTION_CHANGED,
                        &SelectionChangedParams {
                            selected_element_ids: selected.clone(),
                        },
                    );
                    set_context(&inner.transport, SELECTED_ELEMENTS_CONTEXT, json!(selected.len()));
                }
            }));

        let weak = Arc::downgrade(&inner);
        inner.subscriptions.add(inner.router.on_document_edited(move |edit| {
            if let Some(inner) = weak.upgrade() {
                let document_id = edit.document().id();
                inner
                    .edits
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(document_id, edit.clone());
                inner.transport.notify(
                    methods::DOCUMENT_DID_CHANGE,
                    &DocumentParams {
                        document_id: document_id.as_u64(),
                    },
                );
            }
        }));

        let transport = inner.transport.clone();
        inner.subscriptions.add(inner.focus.on_focus_changed(move |focused| {
            set_context(&transport, EDITOR_FOCUSED_CONTEXT, json!(*focused));
        }));

        Self { inner }
    }

    pub fn router(&self) -> &Router {
        &self.inner.router
    }

    /// Most recent selection reported by any diagram.
    pub fn last_selection(&self) -> Vec<String> {
        self.inner
            .selection
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn endpoint(&self, client_id: &str) -> Option<WebviewEndpoint> {
        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(client_id)
            .cloned()
    }

    /// Serve host messages until the host disconnects.
    ///
    /// Requests run concurrently because a save only completes after further
    /// webview traffic; notifications are handled in arrival order.
    pub async fn run(&self, mut incoming: mpsc::Receiver<IncomingMessage>) {
        info!("Host bridge started");

        while let Some(message) = incoming.recv().await {
            match message {
                IncomingMessage::Request(request) => {
                    let bridge = self.clone();
                    tokio::spawn(async move { bridge.handle_request(request).await });
                }
                IncomingMessage::Notification(notification) => {
                    self.handle_notification(notification);
                }
            }
        }

        info!("Host bridge stopped");
    }

    /// Handle a JSON-RPC request.
    async fn handle_request(&self, request: JsonRpcRequest) {
        let id = match request.id {
            Some(id) => id,
            None => {
                warn!("Received request without ID");
                return;
            }
        };

        debug!("Handling request: {} (id={:?})", request.method, id);
        let result = self.dispatch(&request.method, request.params).await;

        if let Err(e) = self.inner.transport.send_response(id, result) {
            error!("Failed to send response: {}", e);
        }
    }

    /// Run one host request.
    pub async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match method {
            methods::DOCUMENT_OPEN => to_result(self.open_document(parse_params(params)?)),
            methods::EDITOR_RESOLVE => to_result(self.resolve_editor(parse_params(params)?)?),
            methods::DOCUMENT_SAVE => self.save(parse_params(params)?).await,
            methods::DOCUMENT_SAVE_AS => self.save_as(parse_params(params)?).await,
            methods::DOCUMENT_REVERT => self.revert(parse_params(params)?).await,
            methods::DOCUMENT_BACKUP => to_result(self.backup(parse_params(params)?).await?),
            methods::DOCUMENT_UNDO => self.undo(parse_params(params)?, false),
            methods::DOCUMENT_REDO => self.undo(parse_params(params)?, true),
            methods::COMMAND_EXECUTE => to_result(self.execute_command(parse_params(params)?)?),
            _ => {
                warn!("Unknown method: {}", method);
                Err(JsonRpcError::method_not_found(method))
            }
        }
    }

    /// Handle a JSON-RPC notification.
    pub fn handle_notification(&self, notification: JsonRpcNotification) {
        debug!("Handling notification: {}", notification.method);

        let result = match notification.method.as_str() {
            methods::PANEL_VIEW_STATE => parse_params(notification.params)
                .map(|params: ViewStateParams| self.set_view_state(params)),
            methods::PANEL_DISPOSE => {
                parse_params(notification.params).map(|params: PanelParams| self.dispose_panel(params))
            }
            methods::WEBVIEW_MESSAGE => parse_params(notification.params)
                .map(|params: WebviewMessageParams| self.webview_message(params)),
            methods::DOCUMENT_CLOSE => parse_params(notification.params)
                .map(|params: DocumentParams| self.close_document(params)),
            _ => {
                debug!("Ignoring unknown notification: {}", notification.method);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(method = %notification.method, error = %e.message, "Invalid notification");
        }
    }

    /// Stop serving: release every panel and listener.
    pub fn dispose(&self) {
        self.inner.subscriptions.dispose();
        let endpoints: Vec<WebviewEndpoint> = self
            .inner
            .endpoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, endpoint)| endpoint)
            .collect();
        for endpoint in endpoints {
            endpoint.client().panel().dispose();
        }
    }

    // ========================================================================
    // Request Handlers
    // ========================================================================

    fn open_document(&self, params: OpenDocumentParams) -> OpenDocumentResult {
        let document = DiagramDocument::new(params.uri);
        let document_id = document.id();
        debug!(uri = %document.uri(), %document_id, "Opened document");
        self.inner
            .documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(document_id, document);
        OpenDocumentResult {
            document_id: document_id.as_u64(),
        }
    }

    /// Create the panel and client for a document and start routing.
    fn resolve_editor(&self, params: DocumentParams) -> Result<ResolveEditorResult, JsonRpcError> {
        let document = self.document(params.document_id)?;
        let client_id = self.inner.ids.next_id();
        let panel = WebviewPanel::new(true);
        let client = GlspClient::new(client_id.clone(), document.clone(), panel.clone());

        let identifier = DiagramIdentifier {
            diagram_type: self.inner.ids.diagram_type().to_string(),
            uri: serialize_uri(document.uri()),
            client_id: client_id.clone(),
        };
        let endpoint =
            WebviewEndpoint::attach(client.clone(), identifier, self.inner.transport.clone());
        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(client_id.clone(), endpoint);

        self.inner.focus.register_panel(&panel);
        self.inner.router.register_client(client);
        info!(client_id = %client_id, uri = %document.uri(), "Resolved diagram editor");

        Ok(ResolveEditorResult { client_id })
    }

    async fn save(&self, params: DocumentParams) -> Result<Value, JsonRpcError> {
        let document = self.document(params.document_id)?;
        self.inner
            .editor
            .save(&document, &CancellationToken::new())
            .await
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
        Ok(Value::Null)
    }

    async fn save_as(&self, params: DestinationParams) -> Result<Value, JsonRpcError> {
        let document = self.document(params.document_id)?;
        self.inner
            .editor
            .save_as(&document, &params.destination, &CancellationToken::new())
            .await
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
        Ok(Value::Null)
    }

    async fn revert(&self, params: DocumentParams) -> Result<Value, JsonRpcError> {
        let document = self.document(params.document_id)?;
        self.inner
            .editor
            .revert(&document, &CancellationToken::new())
            .await
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
        Ok(Value::Null)
    }

    async fn backup(&self, params: DestinationParams) -> Result<BackupResult, JsonRpcError> {
        let document = self.document(params.document_id)?;
        let backup = self
            .inner
            .editor
            .backup(&document, &params.destination, &CancellationToken::new())
            .await
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
        Ok(BackupResult { id: backup.id })
    }

    fn undo(&self, params: DocumentParams, redo: bool) -> Result<Value, JsonRpcError> {
        let document_id = DocumentId::from_raw(params.document_id);
        let edit = self
            .inner
            .edits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&document_id)
            .cloned()
            .ok_or_else(|| {
                JsonRpcError::invalid_params(format!("No edit recorded for document {document_id}"))
            })?;

        if redo {
            edit.redo();
        } else {
            edit.undo();
        }
        Ok(Value::Null)
    }

    fn execute_command(&self, params: ExecuteCommandParams) -> Result<ExecuteCommandResult, JsonRpcError> {
        let command: EditorCommand = params
            .command
            .parse()
            .map_err(|e: String| JsonRpcError::invalid_params(e))?;
        let action = command.action(&self.last_selection());
        let delivered = self.inner.router.send_action_to_active_client(&action);
        debug!(%command, delivered, "Executed command");
        Ok(ExecuteCommandResult { delivered })
    }

    // ========================================================================
    // Notification Handlers
    // ========================================================================

    fn set_view_state(&self, params: ViewStateParams) {
        match self.endpoint(&params.client_id) {
            Some(endpoint) => endpoint.client().panel().set_active(params.active),
            None => debug!(client_id = %params.client_id, "View state for unknown panel"),
        }
    }

    fn dispose_panel(&self, params: PanelParams) {
        let endpoint = self
            .inner
            .endpoints
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&params.client_id);
        self.inner
            .edits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, edit| edit.client_id() != params.client_id);
        match endpoint {
            Some(endpoint) => endpoint.client().panel().dispose(),
            None => debug!(client_id = %params.client_id, "Dispose for unknown panel"),
        }
    }

    fn webview_message(&self, params: WebviewMessageParams) {
        match self.endpoint(&params.client_id) {
            Some(endpoint) => endpoint.receive(params.message),
            None => debug!(client_id = %params.client_id, "Message from unknown webview"),
        }
    }

    fn close_document(&self, params: DocumentParams) {
        let document_id = DocumentId::from_raw(params.document_id);
        self.inner
            .documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&document_id);
        self.inner
            .edits
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&document_id);
        debug!(%document_id, "Closed document");
    }

    fn document(&self, raw_id: u64) -> Result<DiagramDocument, JsonRpcError> {
        let document_id = DocumentId::from_raw(raw_id);
        self.inner
            .documents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&document_id)
            .cloned()
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Unknown document {document_id}")))
    }
}

fn set_context(transport: &Transport, key: &str, value: Value) {
    transport.notify(
        methods::CONTEXT_SET,
        &SetContextParams {
            key: key.to_string(),
            value,
        },
    );
}

fn to_result<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}
