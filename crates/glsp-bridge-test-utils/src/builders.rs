//! Shortcuts for building clients and envelopes in tests.

use glsp_bridge_core::{DiagramDocument, GlspClient, Router, WebviewPanel};
use serde_json::{json, Value};

use crate::probe::ChannelProbe;

/// A registered client plus a probe on what the router sends it.
pub struct OpenedClient {
    pub client: GlspClient,
    pub received: ChannelProbe<Value>,
}

impl OpenedClient {
    pub fn document(&self) -> &DiagramDocument {
        self.client.document()
    }

    /// Kinds of the actions the client received, in order.
    pub fn received_kinds(&self) -> Vec<String> {
        self.received
            .events()
            .iter()
            .filter_map(|m| m["action"]["kind"].as_str().map(str::to_string))
            .collect()
    }
}

/// Create a client for a fresh document at `uri` and register it.
pub fn open_client(router: &Router, client_id: &str, uri: &str, active: bool) -> OpenedClient {
    open_document(router, client_id, DiagramDocument::new(uri), active)
}

/// Register a client for an existing document.
pub fn open_document(
    router: &Router,
    client_id: &str,
    document: DiagramDocument,
    active: bool,
) -> OpenedClient {
    let client = GlspClient::new(client_id, document, WebviewPanel::new(active));
    let received = ChannelProbe::attach(client.to_client());
    router.register_client(client.clone());
    OpenedClient { client, received }
}

/// An action envelope with a raw action.
pub fn envelope(client_id: &str, action: Value) -> Value {
    json!({"clientId": client_id, "action": action})
}

pub fn select(client_id: &str, ids: &[&str]) -> Value {
    envelope(
        client_id,
        json!({"kind": "elementSelected", "selectedElementsIDs": ids, "deselectedElementsIDs": []}),
    )
}

pub fn dirty_state(client_id: &str, is_dirty: bool, reason: &str) -> Value {
    envelope(
        client_id,
        json!({"kind": "setDirtyState", "isDirty": is_dirty, "reason": reason}),
    )
}

pub fn markers(client_id: &str, markers: &[(&str, &str)]) -> Value {
    let markers: Vec<Value> = markers
        .iter()
        .map(|(description, kind)| {
            json!({"label": "", "description": description, "elementId": "", "kind": kind})
        })
        .collect();
    envelope(client_id, json!({"kind": "setMarkers", "markers": markers}))
}
