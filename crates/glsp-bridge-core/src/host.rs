//! The editor host as seen by the router.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Options of a host save dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDialogOptions {
    /// Filter name to accepted extensions.
    pub filters: BTreeMap<String, Vec<String>>,
    pub save_label: String,
    pub title: String,
}

impl SaveDialogOptions {
    /// The dialog shown for exported SVG text.
    pub fn svg_export() -> Self {
        let mut filters = BTreeMap::new();
        filters.insert("SVG".to_string(), vec!["svg".to_string()]);
        Self {
            filters,
            save_label: "Export".to_string(),
            title: "Export as SVG".to_string(),
        }
    }
}

/// Editor services the router calls for its side effects.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Open `uri` in an editor using the given show options.
    async fn show_text_document(&self, uri: &str, options: Map<String, Value>) -> anyhow::Result<()>;

    /// Ask the user for a save location. `None` when cancelled.
    async fn show_save_dialog(&self, options: SaveDialogOptions) -> anyhow::Result<Option<PathBuf>>;

    /// Write text to a location chosen by the user.
    async fn write_file(&self, path: &Path, contents: &str) -> anyhow::Result<()> {
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}

/// A host without UI: navigation does nothing and dialogs are cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

#[async_trait]
impl EditorHost for NoopHost {
    async fn show_text_document(&self, uri: &str, _options: Map<String, Value>) -> anyhow::Result<()> {
        tracing::debug!(uri, "No host to open external target");
        Ok(())
    }

    async fn show_save_dialog(&self, _options: SaveDialogOptions) -> anyhow::Result<Option<PathBuf>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_svg_export_options() {
        let options = SaveDialogOptions::svg_export();
        let value = serde_json::to_value(&options).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "filters": {"SVG": ["svg"]},
                "saveLabel": "Export",
                "title": "Export as SVG"
            })
        );
    }

    #[tokio::test]
    async fn test_noop_host() {
        let host = NoopHost;
        assert!(host.show_text_document("file:///a", Map::new()).await.is_ok());
        assert!(host
            .show_save_dialog(SaveDialogOptions::svg_export())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_default_write_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.svg");
        NoopHost.write_file(&path, "<svg/>").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<svg/>");
    }
}
