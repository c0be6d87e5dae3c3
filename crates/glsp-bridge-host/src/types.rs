//! Host protocol type definitions.
//!
//! The host editor and the bridge exchange JSON-RPC 2.0 messages over
//! stdin/stdout as newline-delimited JSON (ndjson).

use glsp_bridge_core::{Diagnostic, SaveDialogOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

// ============================================================================
// JSON-RPC Types
// ============================================================================

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<JsonRpcId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: JsonRpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 notification (no id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC request/response ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum JsonRpcId {
    Number(i64),
    String(String),
}

/// JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

/// Decode request params into `T`.
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

// ============================================================================
// Method Names
// ============================================================================

pub mod methods {
    // Host -> bridge requests
    pub const DOCUMENT_OPEN: &str = "document/open";
    pub const EDITOR_RESOLVE: &str = "editor/resolve";
    pub const DOCUMENT_SAVE: &str = "document/save";
    pub const DOCUMENT_SAVE_AS: &str = "document/saveAs";
    pub const DOCUMENT_REVERT: &str = "document/revert";
    pub const DOCUMENT_BACKUP: &str = "document/backup";
    pub const DOCUMENT_UNDO: &str = "document/undo";
    pub const DOCUMENT_REDO: &str = "document/redo";
    pub const COMMAND_EXECUTE: &str = "command/execute";

    // Host -> bridge notifications
    pub const PANEL_VIEW_STATE: &str = "panel/viewState";
    pub const PANEL_DISPOSE: &str = "panel/dispose";
    pub const WEBVIEW_MESSAGE: &str = "webview/message";
    pub const DOCUMENT_CLOSE: &str = "document/close";

    // Bridge -> host notifications
    pub const WEBVIEW_POST_MESSAGE: &str = "webview/postMessage";
    pub const DOCUMENT_DID_CHANGE: &str = "document/didChange";
    pub const DIAGNOSTICS_PUBLISH: &str = "diagnostics/publish";
    pub const SELECTION_CHANGED: &str = "selection/changed";
    pub const CONTEXT_SET: &str = "context/set";

    // Bridge -> host requests
    pub const SHOW_TEXT_DOCUMENT: &str = "window/showTextDocument";
    pub const SHOW_SAVE_DIALOG: &str = "window/showSaveDialog";
}

/// Context key: a diagram panel has focus.
pub const EDITOR_FOCUSED_CONTEXT: &str = "glsp-editor-focused";

/// Context key: number of selected elements in the focused diagram.
pub const SELECTED_ELEMENTS_CONTEXT: &str = "glsp-selected-elements-amount";

// ============================================================================
// Host -> Bridge
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenDocumentParams {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDocumentResult {
    pub document_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentParams {
    pub document_id: u64,
}

/// Params of `document/saveAs` and `document/backup`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationParams {
    pub document_id: u64,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveEditorResult {
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupResult {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteCommandParams {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteCommandResult {
    /// False when no diagram had focus.
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStateParams {
    pub client_id: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelParams {
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebviewMessageParams {
    pub client_id: String,
    pub message: Value,
}

// ============================================================================
// Bridge -> Host
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageParams {
    pub client_id: String,
    pub message: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionChangedParams {
    pub selected_element_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContextParams {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowTextDocumentParams {
    pub uri: String,
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowSaveDialogParams {
    pub options: SaveDialogOptions,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShowSaveDialogResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}
