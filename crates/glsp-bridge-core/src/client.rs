//! Diagram clients: one per open webview panel.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::document::DiagramDocument;
use crate::event::{Emitter, Subscription};

static NEXT_PANEL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a webview panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelId(u64);

struct PanelInner {
    id: PanelId,
    active: AtomicBool,
    disposed: AtomicBool,
    view_state: Emitter<bool>,
    on_dispose: Emitter<()>,
}

/// The rendering surface of one diagram client.
///
/// The host drives it: focus changes go through [`WebviewPanel::set_active`],
/// closing the editor through [`WebviewPanel::dispose`].
#[derive(Clone)]
pub struct WebviewPanel {
    inner: Arc<PanelInner>,
}

impl WebviewPanel {
    pub fn new(active: bool) -> Self {
        Self {
            inner: Arc::new(PanelInner {
                id: PanelId(NEXT_PANEL_ID.fetch_add(1, Ordering::SeqCst)),
                active: AtomicBool::new(active),
                disposed: AtomicBool::new(false),
                view_state: Emitter::new(),
                on_dispose: Emitter::new(),
            }),
        }
    }

    pub fn id(&self) -> PanelId {
        self.inner.id
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Record a view-state change and notify listeners with the new focus.
    pub fn set_active(&self, active: bool) {
        if self.is_disposed() {
            return;
        }
        self.inner.active.store(active, Ordering::SeqCst);
        self.inner.view_state.fire(active);
    }

    /// Listen for view-state changes. The payload is the new `active` flag.
    pub fn on_did_change_view_state(
        &self,
        listener: impl Fn(&bool) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.view_state.on(listener)
    }

    pub fn on_did_dispose(&self, listener: impl Fn(&()) + Send + Sync + 'static) -> Subscription {
        self.inner.on_dispose.on(listener)
    }

    /// Close the panel. Dispose listeners run once; later calls do nothing.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.active.store(false, Ordering::SeqCst);
        self.inner.on_dispose.fire(());
        self.inner.on_dispose.dispose();
        self.inner.view_state.dispose();
    }
}

impl std::fmt::Debug for WebviewPanel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebviewPanel")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// One open diagram panel as registered with the router.
///
/// `to_client` carries envelopes from the router to the webview,
/// `from_client` carries envelopes the webview sends.
#[derive(Clone)]
pub struct GlspClient {
    client_id: String,
    document: DiagramDocument,
    panel: WebviewPanel,
    to_client: Emitter<Value>,
    from_client: Emitter<Value>,
}

impl GlspClient {
    pub fn new(client_id: impl Into<String>, document: DiagramDocument, panel: WebviewPanel) -> Self {
        Self {
            client_id: client_id.into(),
            document,
            panel,
            to_client: Emitter::new(),
            from_client: Emitter::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn document(&self) -> &DiagramDocument {
        &self.document
    }

    pub fn panel(&self) -> &WebviewPanel {
        &self.panel
    }

    /// Messages routed to this client.
    pub fn to_client(&self) -> &Emitter<Value> {
        &self.to_client
    }

    /// Messages sent by this client.
    pub fn from_client(&self) -> &Emitter<Value> {
        &self.from_client
    }
}

impl std::fmt::Debug for GlspClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlspClient")
            .field("client_id", &self.client_id)
            .field("document", &self.document)
            .field("panel", &self.panel)
            .finish()
    }
}

/// Generates `<diagramType>_<n>` client ids, unique for the generator's lifetime.
#[derive(Debug)]
pub struct ClientIdGenerator {
    diagram_type: String,
    count: AtomicU64,
}

impl ClientIdGenerator {
    pub fn new(diagram_type: impl Into<String>) -> Self {
        Self {
            diagram_type: diagram_type.into(),
            count: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        format!("{}_{}", self.diagram_type, n)
    }

    pub fn diagram_type(&self) -> &str {
        &self.diagram_type
    }
}
