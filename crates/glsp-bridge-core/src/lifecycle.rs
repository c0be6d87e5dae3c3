//! Host document lifecycle (save, revert, backup) translated into actions.
//!
//! A save sends `saveModel` to the document's diagram and completes when the
//! diagram reports `setDirtyState` with reason `save`. Revert sends
//! `requestModel` and returns immediately. Backup produces no traffic.
//!
//! Cancellation tokens are accepted for parity with the host API but are not
//! observed: a save in flight on the server cannot be recalled.

use async_trait::async_trait;
use glsp_bridge_protocol::{Action, RequestModelAction, SaveModelAction};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::document::{DiagramDocument, DocumentBackup, DocumentId};
use crate::error::{BridgeError, BridgeResult};
use crate::router::Router;

/// Pending save confirmations per document.
#[derive(Default)]
pub(crate) struct SaveWaiters {
    waiters: Mutex<HashMap<DocumentId, Vec<oneshot::Sender<()>>>>,
}

impl SaveWaiters {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, document: DocumentId) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(document)
            .or_default()
            .push(tx);
        rx
    }

    /// Complete every waiter of `document`. Returns how many were waiting.
    pub(crate) fn resolve(&self, document: DocumentId) -> usize {
        let senders = self
            .waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&document)
            .unwrap_or_default();
        let count = senders.len();
        for sender in senders {
            let _ = sender.send(());
        }
        count
    }

    /// Fail every waiter of `document`.
    pub(crate) fn reject(&self, document: DocumentId) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&document)
            .map(|senders| senders.len())
            .unwrap_or(0)
    }

    pub(crate) fn reject_all(&self) {
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub(crate) fn pending(&self, document: DocumentId) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&document)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Router {
    /// Save `document`, optionally to `destination` ("save as").
    ///
    /// Resolves once the diagram confirms the save. Fails immediately, without
    /// sending anything, if no client edits the document, and fails with
    /// [`BridgeError::ClientDisposed`] if the client closes first.
    pub async fn save_document(
        &self,
        document: &DiagramDocument,
        destination: Option<&str>,
        _cancellation: &CancellationToken,
    ) -> BridgeResult<()> {
        let client = self
            .inner
            .registry
            .find_by_document(document.id())
            .ok_or_else(|| {
                warn!(uri = %document.uri(), "Save requested for unregistered document");
                BridgeError::not_registered(document.uri())
            })?;

        // Register before sending: the confirmation may arrive synchronously.
        let confirmation = self.inner.save_waiters.register(document.id());
        let action = match destination {
            Some(destination) => SaveModelAction::to(destination),
            None => SaveModelAction::new(),
        };
        self.send_action_to_client(client.client_id(), &Action::SaveModel(action));

        confirmation
            .await
            .map_err(|_| BridgeError::client_disposed(client.client_id()))?;
        debug!(uri = %document.uri(), "Save confirmed");
        Ok(())
    }

    /// Ask the server to reload `document` from disk. Does not wait.
    pub fn revert_document(
        &self,
        document: &DiagramDocument,
        diagram_type: &str,
        _cancellation: &CancellationToken,
    ) -> BridgeResult<()> {
        let client = self
            .inner
            .registry
            .find_by_document(document.id())
            .ok_or_else(|| {
                warn!(uri = %document.uri(), "Revert requested for unregistered document");
                BridgeError::not_registered(document.uri())
            })?;

        let action = RequestModelAction::new(document.uri(), diagram_type);
        self.send_action_to_client(client.client_id(), &Action::RequestModel(action));
        Ok(())
    }

    /// Describe a backup of `document` at `destination`.
    pub fn backup_document(
        &self,
        document: &DiagramDocument,
        destination: &str,
        _cancellation: &CancellationToken,
    ) -> DocumentBackup {
        debug!(uri = %document.uri(), destination, "Backing up document");
        DocumentBackup {
            id: destination.to_string(),
        }
    }

    /// Number of saves of `document` waiting for confirmation.
    pub fn pending_saves(&self, document: &DiagramDocument) -> usize {
        self.inner.save_waiters.pending(document.id())
    }
}

/// Host-side editor provider for one diagram type.
///
/// Every hook defaults to a no-op; providers override what they persist
/// themselves.
#[async_trait]
pub trait DiagramEditorProvider: Send + Sync {
    /// Diagram type as registered on the server.
    fn diagram_type(&self) -> &str;

    async fn save_custom_document(
        &self,
        _document: &DiagramDocument,
        _cancellation: &CancellationToken,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn save_custom_document_as(
        &self,
        _document: &DiagramDocument,
        _destination: &str,
        _cancellation: &CancellationToken,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn revert_custom_document(
        &self,
        _document: &DiagramDocument,
        _cancellation: &CancellationToken,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn backup_custom_document(
        &self,
        _document: &DiagramDocument,
        _destination: &str,
        _cancellation: &CancellationToken,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Combines a provider with the router: each lifecycle call runs the
/// provider hook and the router operation concurrently and succeeds when
/// both do.
pub struct EditorProviderWrapper<P> {
    provider: P,
    router: Router,
}

impl<P: DiagramEditorProvider> EditorProviderWrapper<P> {
    pub fn new(provider: P, router: Router) -> Self {
        Self { provider, router }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn save(
        &self,
        document: &DiagramDocument,
        cancellation: &CancellationToken,
    ) -> anyhow::Result<()> {
        let (provider, router) = tokio::join!(
            self.provider.save_custom_document(document, cancellation),
            self.router.save_document(document, None, cancellation)
        );
        provider?;
        router?;
        Ok(())
    }

    pub async fn save_as(
        &self,
        document: &DiagramDocument,
        destination: &str,
        cancellation: &CancellationToken,
    ) -> anyhow::Result<()> {
        let (provider, router) = tokio::join!(
            self.provider
                .save_custom_document_as(document, destination, cancellation),
            self.router
                .save_document(document, Some(destination), cancellation)
        );
        provider?;
        router?;
        Ok(())
    }

    pub async fn revert(
        &self,
        document: &DiagramDocument,
        cancellation: &CancellationToken,
    ) -> anyhow::Result<()> {
        let router = self
            .router
            .revert_document(document, self.provider.diagram_type(), cancellation);
        self.provider
            .revert_custom_document(document, cancellation)
            .await?;
        router?;
        Ok(())
    }

    pub async fn backup(
        &self,
        document: &DiagramDocument,
        destination: &str,
        cancellation: &CancellationToken,
    ) -> anyhow::Result<DocumentBackup> {
        self.provider
            .backup_custom_document(document, destination, cancellation)
            .await?;
        Ok(self.router.backup_document(document, destination, cancellation))
    }
}
