//! Test doubles for host collaborators.

use async_trait::async_trait;
use glsp_bridge_core::{EditorHost, SaveDialogOptions};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// A recorded host call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    ShowTextDocument {
        uri: String,
        options: Map<String, Value>,
    },
    ShowSaveDialog(SaveDialogOptions),
    WriteFile {
        path: PathBuf,
        contents: String,
    },
}

/// An [`EditorHost`] that records every call.
///
/// Save dialogs answer with the configured path. Files are not written to
/// disk unless [`RecordingHost::writing_files`] is enabled.
#[derive(Clone, Default)]
pub struct RecordingHost {
    calls: Arc<Mutex<Vec<HostCall>>>,
    save_path: Arc<Mutex<Option<PathBuf>>>,
    fail_navigation: bool,
    write_files: bool,
    notify: Arc<Notify>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer save dialogs with `path`.
    pub fn with_save_path(self, path: impl Into<PathBuf>) -> Self {
        *self.save_path.lock().unwrap() = Some(path.into());
        self
    }

    /// Make `show_text_document` fail, as for a missing target.
    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    /// Actually write files handed to `write_file`.
    pub fn writing_files(mut self) -> Self {
        self.write_files = true;
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `count` calls were recorded.
    pub async fn wait_for_calls(&self, count: usize, timeout: Duration) -> Vec<HostCall> {
        let _ = tokio::time::timeout(timeout, async {
            loop {
                let notified = self.notify.notified();
                if self.calls.lock().unwrap().len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await;
        self.calls()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl EditorHost for RecordingHost {
    async fn show_text_document(&self, uri: &str, options: Map<String, Value>) -> anyhow::Result<()> {
        self.record(HostCall::ShowTextDocument {
            uri: uri.to_string(),
            options,
        });
        if self.fail_navigation {
            anyhow::bail!("no such target: {}", uri);
        }
        Ok(())
    }

    async fn show_save_dialog(&self, options: SaveDialogOptions) -> anyhow::Result<Option<PathBuf>> {
        self.record(HostCall::ShowSaveDialog(options));
        Ok(self.save_path.lock().unwrap().clone())
    }

    async fn write_file(&self, path: &Path, contents: &str) -> anyhow::Result<()> {
        if self.write_files {
            tokio::fs::write(path, contents).await?;
        }
        self.record(HostCall::WriteFile {
            path: path.to_path_buf(),
            contents: contents.to_string(),
        });
        Ok(())
    }
}
