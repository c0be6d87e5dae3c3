//! The message router between diagram clients and the GLSP server.
//!
//! Every message passes the same pipeline, once per direction:
//!
//! 1. receive on the source channel (logged)
//! 2. receive hook (may rewrite, veto or disable processing)
//! 3. built-in processing of known actions
//! 4. propagate hook
//! 5. dispatch: to the server, or to the client the envelope addresses
//!
//! All stages run synchronously inside the emitter callback of the source
//! channel. Effects that need the host (opening a target, the SVG save
//! dialog) are spawned on the tokio runtime and never block routing.
//!
//! The router assumes a single event loop: all channels fire from tasks on
//! one current-thread runtime, so a pipeline run is never interleaved with
//! another. Driving it from several worker threads at once lets, for
//! example, a disposal race the markers of the client being disposed.

use glsp_bridge_protocol::{
    Action, ActionMessage, DirtyStateReason, ExportSvgAction, NavigationTarget, RedoAction,
    UndoAction,
};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

use crate::channel::ServerChannel;
use crate::client::GlspClient;
use crate::document::DiagramDocument;
use crate::event::{DisposableStore, Emitter, Subscription};
use crate::host::{EditorHost, NoopHost, SaveDialogOptions};
use crate::interceptor::{Continuation, InterceptorConfig, Origin};
use crate::lifecycle::SaveWaiters;
use crate::registry::ClientRegistry;
use crate::state::{Diagnostic, DiagnosticsState, SelectionState};

/// Construction options of a [`Router`].
pub struct RouterOptions {
    pub server: ServerChannel,
    pub host: Arc<dyn EditorHost>,
    /// Log every routed message at info level instead of trace.
    pub logging: bool,
    pub interceptors: InterceptorConfig,
}

impl RouterOptions {
    pub fn new(server: ServerChannel) -> Self {
        Self {
            server,
            host: Arc::new(NoopHost),
            logging: false,
            interceptors: InterceptorConfig::default(),
        }
    }

    pub fn with_host(mut self, host: Arc<dyn EditorHost>) -> Self {
        self.host = host;
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_interceptors(mut self, interceptors: InterceptorConfig) -> Self {
        self.interceptors = interceptors;
        self
    }
}

/// Diagnostics of one document changed.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsChanged {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// A diagram reported an edit. Holds undo/redo handles for the host.
#[derive(Clone)]
pub struct DocumentEdit {
    client_id: String,
    document: DiagramDocument,
    router: Weak<RouterInner>,
}

impl DocumentEdit {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn document(&self) -> &DiagramDocument {
        &self.document
    }

    /// Send an undo to the diagram that made the edit.
    pub fn undo(&self) {
        if let Some(inner) = self.router.upgrade() {
            Router { inner }.send_action_to_client(&self.client_id, &Action::Undo(UndoAction {}));
        }
    }

    /// Send a redo to the diagram that made the edit.
    pub fn redo(&self) {
        if let Some(inner) = self.router.upgrade() {
            Router { inner }.send_action_to_client(&self.client_id, &Action::Redo(RedoAction {}));
        }
    }
}

impl std::fmt::Debug for DocumentEdit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentEdit")
            .field("client_id", &self.client_id)
            .field("document", &self.document)
            .finish()
    }
}

pub(crate) struct RouterInner {
    server: ServerChannel,
    host: Arc<dyn EditorHost>,
    logging: bool,
    interceptors: InterceptorConfig,
    pub(crate) registry: ClientRegistry,
    selection: SelectionState,
    diagnostics: DiagnosticsState,
    pub(crate) save_waiters: SaveWaiters,
    selection_changed: Emitter<Vec<String>>,
    diagnostics_changed: Emitter<DiagnosticsChanged>,
    document_edited: Emitter<DocumentEdit>,
    subscriptions: DisposableStore,
    disposed: AtomicBool,
}

/// Routes envelopes between registered diagram clients and the server.
///
/// Cloning yields another handle to the same router. Fire its channels from
/// a single-threaded runtime only.
#[derive(Clone)]
pub struct Router {
    pub(crate) inner: Arc<RouterInner>,
}

impl Router {
    /// Create a router listening on `options.server`.
    pub fn new(options: RouterOptions) -> Self {
        let inner = Arc::new(RouterInner {
            server: options.server,
            host: options.host,
            logging: options.logging,
            interceptors: options.interceptors,
            registry: ClientRegistry::new(),
            selection: SelectionState::new(),
            diagnostics: DiagnosticsState::new(),
            save_waiters: SaveWaiters::new(),
            selection_changed: Emitter::new(),
            diagnostics_changed: Emitter::new(),
            document_edited: Emitter::new(),
            subscriptions: DisposableStore::new(),
            disposed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let server_listener = inner.server.from_server.on(move |message: &Value| {
            if let Some(inner) = weak.upgrade() {
                Router { inner }.receive(Origin::Server, message.clone());
            }
        });
        inner.subscriptions.add(server_listener);

        Self { inner }
    }

    /// Start routing for a client.
    ///
    /// Subscribes to the client's outbound messages, its panel's view state
    /// and its panel's disposal. A client with an already registered id
    /// replaces the previous one.
    pub fn register_client(&self, client: GlspClient) {
        let client_id = client.client_id().to_string();
        let subscriptions = DisposableStore::new();

        let weak = Arc::downgrade(&self.inner);
        subscriptions.add(client.from_client().on(move |message: &Value| {
            if let Some(inner) = weak.upgrade() {
                Router { inner }.receive(Origin::Client, message.clone());
            }
        }));

        let weak = Arc::downgrade(&self.inner);
        let id = client_id.clone();
        subscriptions.add(client.panel().on_did_change_view_state(move |active: &bool| {
            if !*active {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                let selection = inner.selection.get(&id);
                inner.selection_changed.fire(selection);
            }
        }));

        let weak = Arc::downgrade(&self.inner);
        let id = client_id.clone();
        subscriptions.add(client.panel().on_did_dispose(move |_| {
            if let Some(inner) = weak.upgrade() {
                Router { inner }.dispose_client(&id);
            }
        }));

        debug!(client_id = %client_id, uri = %client.document().uri(), "Registering diagram client");
        self.inner.registry.register(client, subscriptions);
    }

    /// Stop routing for a client and drop its derived state.
    ///
    /// Returns false if the client was not registered.
    pub fn dispose_client(&self, client_id: &str) -> bool {
        let Some(client) = self.inner.registry.unregister(client_id) else {
            return false;
        };

        self.inner.selection.remove(client_id);

        let uri = client.document().uri();
        if !self.inner.registry.has_other_client_for_uri(uri, client_id)
            && self.inner.diagnostics.clear_uri(uri)
        {
            self.inner.diagnostics_changed.fire(DiagnosticsChanged {
                uri: uri.to_string(),
                diagnostics: Vec::new(),
            });
        }

        let rejected = self.inner.save_waiters.reject(client.document().id());
        if rejected > 0 {
            warn!(client_id, rejected, "Diagram client disposed with pending saves");
        }

        debug!(client_id, "Disposed diagram client");
        true
    }

    /// Send an action straight to the client whose panel has focus.
    ///
    /// At most one client receives it. Returns false when no panel has focus.
    pub fn send_action_to_active_client(&self, action: &Action) -> bool {
        match self.inner.registry.active_client() {
            Some(client) => {
                self.send_action_to_client(client.client_id(), action);
                true
            }
            None => {
                debug!(kind = action.kind(), "No active diagram client, dropping action");
                false
            }
        }
    }

    /// Send an action to one client, bypassing the server.
    pub fn send_action_to_client(&self, client_id: &str, action: &Action) {
        let envelope = ActionMessage::local(client_id, action);
        self.send_message_to_client(client_id, envelope.to_value());
    }

    fn send_message_to_client(&self, client_id: &str, message: Value) {
        match self.inner.registry.get(client_id) {
            Some(client) => client.to_client().fire(message),
            None => trace!(client_id, "Dropping message for unknown client"),
        }
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.inner.registry
    }

    pub fn client(&self, client_id: &str) -> Option<GlspClient> {
        self.inner.registry.get(client_id)
    }

    /// Recorded selection of a client.
    pub fn selection(&self, client_id: &str) -> Vec<String> {
        self.inner.selection.get(client_id)
    }

    /// Selection of the focused client; empty when none has focus.
    pub fn active_selection(&self) -> Vec<String> {
        self.inner
            .registry
            .active_client()
            .map(|client| self.inner.selection.get(client.client_id()))
            .unwrap_or_default()
    }

    pub fn diagnostics(&self, uri: &str) -> Vec<Diagnostic> {
        self.inner.diagnostics.get(uri)
    }

    pub fn on_selection_changed(
        &self,
        listener: impl Fn(&Vec<String>) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.selection_changed.on(listener)
    }

    pub fn on_diagnostics_changed(
        &self,
        listener: impl Fn(&DiagnosticsChanged) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.diagnostics_changed.on(listener)
    }

    pub fn on_document_edited(
        &self,
        listener: impl Fn(&DocumentEdit) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.document_edited.on(listener)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Stop listening to the server and release every client.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.subscriptions.dispose();
        for client in self.inner.registry.clear() {
            self.inner.selection.remove(client.client_id());
        }
        self.inner.save_waiters.reject_all();
        self.inner.diagnostics.clear();
        self.inner.selection_changed.dispose();
        self.inner.diagnostics_changed.dispose();
        self.inner.document_edited.dispose();
        debug!("Router disposed");
    }

    fn receive(&self, origin: Origin, message: Value) {
        self.log_message(origin, &message);

        let weak = Arc::downgrade(&self.inner);
        let next = Continuation::new(move |message, process| {
            if let Some(inner) = weak.upgrade() {
                Router { inner }.propagate(origin, message, process);
            }
        });
        self.inner.interceptors.receive_hook(origin).call(message, next);
    }

    fn propagate(&self, origin: Origin, message: Option<Value>, process: bool) {
        let (processed, changed) = if process {
            self.process_message(message.clone(), origin)
        } else {
            (message.clone(), false)
        };

        let outgoing = self
            .inner
            .interceptors
            .propagate_hook(origin)
            .call(message.as_ref(), processed, changed);
        let Some(outgoing) = outgoing else {
            return;
        };

        match origin {
            Origin::Client => self.inner.server.to_server.fire(outgoing),
            Origin::Server => match ActionMessage::from_value(&outgoing) {
                Some(envelope) => self.send_message_to_client(&envelope.client_id, outgoing),
                None => trace!("Dropping non-action message from server"),
            },
        }
    }

    /// Built-in reactions. Returns the message to propagate (`None` stops
    /// propagation) and whether processing changed it.
    fn process_message(&self, message: Option<Value>, origin: Origin) -> (Option<Value>, bool) {
        let Some(value) = message else {
            return (None, false);
        };
        let Some(envelope) = ActionMessage::from_value(&value) else {
            return (Some(value), false);
        };
        let Some(client) = self.inner.registry.get(&envelope.client_id) else {
            return (Some(value), false);
        };
        let Some(action) = envelope.typed_action() else {
            return (Some(value), false);
        };

        match action {
            Action::SetDirtyState(dirty) => match dirty.reason {
                Some(DirtyStateReason::Save) => {
                    let resolved = self.inner.save_waiters.resolve(client.document().id());
                    debug!(client_id = %client.client_id(), resolved, "Document saved");
                }
                Some(DirtyStateReason::Operation) if dirty.is_dirty => {
                    self.inner.document_edited.fire(DocumentEdit {
                        client_id: client.client_id().to_string(),
                        document: client.document().clone(),
                        router: Arc::downgrade(&self.inner),
                    });
                }
                _ => {}
            },
            Action::SetMarkers(markers) => {
                let uri = client.document().uri().to_string();
                let diagnostics: Vec<Diagnostic> =
                    markers.markers.iter().map(Diagnostic::from).collect();
                self.inner.diagnostics.set(&uri, diagnostics.clone());
                self.inner
                    .diagnostics_changed
                    .fire(DiagnosticsChanged { uri, diagnostics });
            }
            Action::NavigateToExternalTarget(navigate) => {
                self.open_external_target(navigate.target);
                return (None, true);
            }
            Action::Select(select) => {
                let selection = self
                    .inner
                    .selection
                    .set(client.client_id(), &select.selected_elements_ids);
                self.inner.selection_changed.fire(selection);
                if origin == Origin::Client {
                    // The server mirrors selections back; forwarding would loop.
                    return (None, true);
                }
            }
            Action::ExportSvg(export) => {
                self.export_svg(export);
                return (None, true);
            }
            _ => {}
        }

        (Some(value), false)
    }

    fn open_external_target(&self, target: NavigationTarget) {
        let host = self.inner.host.clone();
        let options = target.show_options();
        let uri = target.uri;
        spawn_side_effect("open external target", async move {
            if let Err(e) = host.show_text_document(&uri, options).await {
                // Targets may legitimately not exist.
                debug!(uri = %uri, error = %e, "Could not open external target");
            }
            Ok(())
        });
    }

    fn export_svg(&self, export: ExportSvgAction) {
        let host = self.inner.host.clone();
        spawn_side_effect("export svg", async move {
            let destination = host.show_save_dialog(SaveDialogOptions::svg_export()).await?;
            if let Some(path) = destination {
                host.write_file(&path, &export.svg).await?;
                info!(path = %path.display(), "Exported diagram as SVG");
            }
            Ok(())
        });
    }

    fn log_message(&self, origin: Origin, message: &Value) {
        match ActionMessage::from_value(message) {
            Some(envelope) => {
                if self.inner.logging {
                    info!(%origin, client_id = %envelope.client_id, kind = envelope.kind(), action = %envelope.action, "Received action");
                } else {
                    trace!(%origin, client_id = %envelope.client_id, kind = envelope.kind(), "Received action");
                }
            }
            None => {
                if self.inner.logging {
                    info!(%origin, %message, "Received non-action message");
                } else {
                    trace!(%origin, "Received non-action message");
                }
            }
        }
    }
}

/// Run a host side effect in the background. Failures are logged.
fn spawn_side_effect<F>(what: &'static str, effect: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = effect.await {
                    error!(error = %e, "Failed to {}", what);
                }
            });
        }
        Err(_) => warn!("No async runtime, skipping {}", what),
    }
}
