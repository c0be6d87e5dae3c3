//! [`EditorHost`] backed by requests to the host editor.

use async_trait::async_trait;
use glsp_bridge_core::{EditorHost, SaveDialogOptions};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::transport::Transport;
use crate::types::{methods, ShowSaveDialogParams, ShowSaveDialogResult, ShowTextDocumentParams};

/// Forwards the router's host effects to the editor as JSON-RPC requests.
#[derive(Clone)]
pub struct StdioHost {
    transport: Transport,
}

impl StdioHost {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl EditorHost for StdioHost {
    async fn show_text_document(&self, uri: &str, options: Map<String, Value>) -> anyhow::Result<()> {
        let params = ShowTextDocumentParams {
            uri: uri.to_string(),
            options,
        };
        self.transport
            .send_request(methods::SHOW_TEXT_DOCUMENT, serde_json::to_value(params)?)
            .await?;
        Ok(())
    }

    async fn show_save_dialog(&self, options: SaveDialogOptions) -> anyhow::Result<Option<PathBuf>> {
        let params = ShowSaveDialogParams { options };
        let result = self
            .transport
            .send_request(methods::SHOW_SAVE_DIALOG, serde_json::to_value(params)?)
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        let result: ShowSaveDialogResult = serde_json::from_value(result)?;
        Ok(result.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_save_dialog_round_trip() {
        let (host_end, bridge_end) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(bridge_end);
        let (transport, _incoming) = Transport::new(reader, writer);
        let host = StdioHost::new(transport);
        let (host_reader, mut host_writer) = tokio::io::split(host_end);

        let dialog = tokio::spawn(async move {
            let first = host.show_save_dialog(SaveDialogOptions::svg_export()).await;
            let second = host.show_save_dialog(SaveDialogOptions::svg_export()).await;
            (first, second)
        });

        let mut lines = BufReader::new(host_reader).lines();
        let sent: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(sent["method"], "window/showSaveDialog");
        assert_eq!(sent["params"]["options"]["saveLabel"], "Export");
        let answer = json!({"jsonrpc": "2.0", "id": sent["id"], "result": {"path": "/tmp/d.svg"}});
        host_writer.write_all(format!("{answer}\n").as_bytes()).await.unwrap();

        // Cancelled dialog.
        let sent: Value = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        let answer = json!({"jsonrpc": "2.0", "id": sent["id"], "result": null});
        host_writer.write_all(format!("{answer}\n").as_bytes()).await.unwrap();

        let (first, second) = dialog.await.unwrap();
        assert_eq!(first.unwrap(), Some(PathBuf::from("/tmp/d.svg")));
        assert_eq!(second.unwrap(), None);
    }
}
