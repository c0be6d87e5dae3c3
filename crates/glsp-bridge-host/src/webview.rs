//! Delivery of envelopes to and from one diagram webview.
//!
//! The webview only receives messages once it reported ready and while its
//! panel is active. Until then messages queue up in order; the diagram
//! identifier is always first in the queue.

use glsp_bridge_core::{DisposableStore, GlspClient};
use glsp_bridge_protocol::{is_action_message, DiagramIdentifier, WebviewReadyMessage};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::transport::Transport;
use crate::types::{methods, PostMessageParams};

#[derive(Default)]
struct EndpointState {
    ready: bool,
    queue: VecDeque<Value>,
}

struct EndpointInner {
    client: GlspClient,
    transport: Transport,
    state: Mutex<EndpointState>,
    subscriptions: DisposableStore,
}

/// Connects a [`GlspClient`] with its webview in the host.
#[derive(Clone)]
pub struct WebviewEndpoint {
    inner: Arc<EndpointInner>,
}

impl WebviewEndpoint {
    /// Start relaying `client.to_client()` to the webview.
    pub fn attach(client: GlspClient, identifier: DiagramIdentifier, transport: Transport) -> Self {
        let mut queue = VecDeque::new();
        match serde_json::to_value(&identifier) {
            Ok(identifier) => queue.push_back(identifier),
            Err(e) => debug!(error = %e, "Could not encode diagram identifier"),
        }

        let inner = Arc::new(EndpointInner {
            client,
            transport,
            state: Mutex::new(EndpointState {
                ready: false,
                queue,
            }),
            subscriptions: DisposableStore::new(),
        });

        let weak = Arc::downgrade(&inner);
        inner.subscriptions.add(inner.client.to_client().on(move |message: &Value| {
            if let Some(inner) = weak.upgrade() {
                WebviewEndpoint { inner }.post(message.clone());
            }
        }));

        // Inactive panels stall delivery until their view state changes.
        let weak = Arc::downgrade(&inner);
        inner
            .subscriptions
            .add(inner.client.panel().on_did_change_view_state(move |_| {
                if let Some(inner) = weak.upgrade() {
                    WebviewEndpoint { inner }.flush();
                }
            }));

        let weak = Arc::downgrade(&inner);
        inner.subscriptions.add(inner.client.panel().on_did_dispose(move |_| {
            if let Some(inner) = weak.upgrade() {
                WebviewEndpoint { inner }.dispose();
            }
        }));

        Self { inner }
    }

    pub fn client_id(&self) -> &str {
        self.inner.client.client_id()
    }

    pub fn client(&self) -> &GlspClient {
        &self.inner.client
    }

    pub fn is_ready(&self) -> bool {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .ready
    }

    /// Messages waiting for the webview.
    pub fn queued(&self) -> usize {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queue
            .len()
    }

    /// Handle a message the webview posted.
    ///
    /// The ready message opens delivery; action envelopes go to the router.
    /// Anything else is dropped.
    pub fn receive(&self, message: Value) {
        if WebviewReadyMessage::is(&message) {
            debug!(client_id = %self.client_id(), "Webview ready");
            self.inner
                .state
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .ready = true;
            self.flush();
        } else if is_action_message(&message) {
            self.inner.client.from_client().fire(message);
        } else {
            trace!(client_id = %self.client_id(), "Ignoring non-action webview message");
        }
    }

    fn post(&self, message: Value) {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queue
            .push_back(message);
        self.flush();
    }

    fn flush(&self) {
        let panel = self.inner.client.panel();
        if panel.is_disposed() || !panel.is_active() {
            return;
        }

        let messages: Vec<Value> = {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.ready {
                return;
            }
            state.queue.drain(..).collect()
        };

        for message in messages {
            let params = PostMessageParams {
                client_id: self.client_id().to_string(),
                message,
            };
            self.inner.transport.notify(methods::WEBVIEW_POST_MESSAGE, &params);
        }
    }

    /// Stop relaying and drop queued messages.
    pub fn dispose(&self) {
        self.inner.subscriptions.dispose();
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queue
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glsp_bridge_core::{DiagramDocument, WebviewPanel};
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream, Lines};

    type HostLines = Lines<BufReader<DuplexStream>>;

    fn setup(active: bool) -> (WebviewEndpoint, GlspClient, HostLines) {
        let (bridge_out, host_in) = tokio::io::duplex(64 * 1024);
        let (transport, _incoming) = Transport::new(tokio::io::empty(), bridge_out);
        let client = GlspClient::new(
            "wf_0",
            DiagramDocument::new("file:///a.wf"),
            WebviewPanel::new(active),
        );
        let identifier = DiagramIdentifier {
            diagram_type: "workflow-diagram".to_string(),
            uri: "file:///a.wf".to_string(),
            client_id: "wf_0".to_string(),
        };
        let endpoint = WebviewEndpoint::attach(client.clone(), identifier, transport);
        (endpoint, client, BufReader::new(host_in).lines())
    }

    async fn next(lines: &mut HostLines) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }

    async fn assert_silent(lines: &mut HostLines) {
        let read = tokio::time::timeout(Duration::from_millis(50), lines.next_line()).await;
        assert!(read.is_err(), "unexpected output {:?}", read);
    }

    #[tokio::test]
    async fn test_messages_wait_for_ready() {
        let (endpoint, client, mut lines) = setup(true);
        let envelope = json!({"clientId": "wf_0", "action": {"kind": "setModel"}});
        client.to_client().fire(envelope.clone());

        assert_eq!(endpoint.queued(), 2);
        assert_silent(&mut lines).await;

        endpoint.receive(json!({"readyMessage": "Webview ready"}));
        assert!(endpoint.is_ready());

        let identifier = next(&mut lines).await;
        assert_eq!(identifier["method"], "webview/postMessage");
        assert_eq!(
            identifier["params"],
            json!({
                "clientId": "wf_0",
                "message": {"diagramType": "workflow-diagram", "uri": "file:///a.wf", "clientId": "wf_0"}
            })
        );
        assert_eq!(next(&mut lines).await["params"]["message"], envelope);
        assert_eq!(endpoint.queued(), 0);
    }

    #[tokio::test]
    async fn test_inactive_panel_stalls_until_view_state_changes() {
        let (endpoint, client, mut lines) = setup(false);
        endpoint.receive(json!({"readyMessage": "ready"}));
        client
            .to_client()
            .fire(json!({"clientId": "wf_0", "action": {"kind": "fit"}}));
        assert_silent(&mut lines).await;

        client.panel().set_active(true);
        assert!(next(&mut lines).await["params"]["message"]["diagramType"].is_string());
        assert_eq!(
            next(&mut lines).await["params"]["message"]["action"]["kind"],
            "fit"
        );
    }

    #[tokio::test]
    async fn test_only_action_messages_reach_router() {
        let (endpoint, client, _lines) = setup(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = client
            .from_client()
            .on(move |m: &Value| sink.lock().unwrap().push(m.clone()));

        let envelope = json!({"clientId": "wf_0", "action": {"kind": "changeBounds"}});
        endpoint.receive(envelope.clone());
        endpoint.receive(json!({"jsonrpc": "2.0", "method": "x"}));
        endpoint.receive(json!({"readyMessage": "ready"}));

        assert_eq!(*seen.lock().unwrap(), vec![envelope]);
    }

    #[tokio::test]
    async fn test_disposed_panel_drops_queue() {
        let (endpoint, client, mut lines) = setup(true);
        client
            .to_client()
            .fire(json!({"clientId": "wf_0", "action": {"kind": "fit"}}));
        client.panel().dispose();

        assert_eq!(endpoint.queued(), 0);
        client
            .to_client()
            .fire(json!({"clientId": "wf_0", "action": {"kind": "center"}}));
        endpoint.receive(json!({"readyMessage": "ready"}));
        assert_eq!(endpoint.queued(), 0);
        assert_silent(&mut lines).await;
    }
}
