//! Registry of live diagram clients.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::client::GlspClient;
use crate::document::DocumentId;
use crate::event::DisposableStore;

struct Registration {
    client: GlspClient,
    subscriptions: DisposableStore,
}

#[derive(Default)]
struct RegistryState {
    /// Client ids in registration order.
    order: Vec<String>,
    clients: HashMap<String, Registration>,
}

/// Bookkeeping of open diagram panels.
///
/// Each registration owns the subscriptions created for its client; they are
/// revoked when the client is unregistered or replaced.
#[derive(Default)]
pub struct ClientRegistry {
    state: RwLock<RegistryState>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` together with its subscriptions.
    ///
    /// A registration with the same client id is replaced and its
    /// subscriptions are revoked.
    pub fn register(&self, client: GlspClient, subscriptions: DisposableStore) {
        let client_id = client.client_id().to_string();
        let replaced = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.order.retain(|id| id != &client_id);
            state.order.push(client_id.clone());
            state.clients.insert(
                client_id,
                Registration {
                    client,
                    subscriptions,
                },
            )
        };

        if let Some(old) = replaced {
            tracing::debug!(client_id = %old.client.client_id(), "Replacing registered client");
            old.subscriptions.dispose();
        }
    }

    /// Remove a client and revoke its subscriptions.
    pub fn unregister(&self, client_id: &str) -> Option<GlspClient> {
        let removed = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.order.retain(|id| id != client_id);
            state.clients.remove(client_id)
        };

        removed.map(|registration| {
            registration.subscriptions.dispose();
            registration.client
        })
    }

    pub fn get(&self, client_id: &str) -> Option<GlspClient> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.clients.get(client_id).map(|r| r.client.clone())
    }

    pub fn contains(&self, client_id: &str) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.clients.contains_key(client_id)
    }

    /// The client editing `document`.
    pub fn find_by_document(&self, document: DocumentId) -> Option<GlspClient> {
        self.clients()
            .into_iter()
            .find(|client| client.document().id() == document)
    }

    /// The first client, in registration order, whose panel has focus.
    pub fn active_client(&self) -> Option<GlspClient> {
        self.clients()
            .into_iter()
            .find(|client| client.panel().is_active())
    }

    /// All clients in registration order.
    pub fn clients(&self) -> Vec<GlspClient> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .order
            .iter()
            .filter_map(|id| state.clients.get(id))
            .map(|r| r.client.clone())
            .collect()
    }

    /// True if any client other than `except` edits a document at `uri`.
    pub fn has_other_client_for_uri(&self, uri: &str, except: &str) -> bool {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .clients
            .values()
            .any(|r| r.client.client_id() != except && r.client.document().uri() == uri)
    }

    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unregister every client.
    pub fn clear(&self) -> Vec<GlspClient> {
        let registrations: Vec<Registration> = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            let order = std::mem::take(&mut state.order);
            let mut clients = std::mem::take(&mut state.clients);
            order.iter().filter_map(|id| clients.remove(id)).collect()
        };

        registrations
            .into_iter()
            .map(|registration| {
                registration.subscriptions.dispose();
                registration.client
            })
            .collect()
    }
}
