//! Selection and diagnostics derived from observed traffic.

use glsp_bridge_protocol::{Marker, MarkerKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Selected element ids per client.
#[derive(Debug, Default)]
pub struct SelectionState {
    selections: RwLock<HashMap<String, Vec<String>>>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection of a client. Duplicate ids keep their first position.
    pub fn set(&self, client_id: &str, element_ids: &[String]) -> Vec<String> {
        let mut unique: Vec<String> = Vec::with_capacity(element_ids.len());
        for id in element_ids {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }

        let mut selections = self.selections.write().unwrap_or_else(|e| e.into_inner());
        selections.insert(client_id.to_string(), unique.clone());
        unique
    }

    /// Selection of a client; empty when nothing was recorded.
    pub fn get(&self, client_id: &str) -> Vec<String> {
        let selections = self.selections.read().unwrap_or_else(|e| e.into_inner());
        selections.get(client_id).cloned().unwrap_or_default()
    }

    pub fn remove(&self, client_id: &str) -> Option<Vec<String>> {
        let mut selections = self.selections.write().unwrap_or_else(|e| e.into_inner());
        selections.remove(client_id)
    }

    pub fn contains(&self, client_id: &str) -> bool {
        let selections = self.selections.read().unwrap_or_else(|e| e.into_inner());
        selections.contains_key(client_id)
    }

    pub fn clear(&self) {
        let mut selections = self.selections.write().unwrap_or_else(|e| e.into_inner());
        selections.clear();
    }
}

/// Severity of an editor diagnostic. Values follow the editor numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error = 0,
    Warning = 1,
    Information = 2,
    Hint = 3,
}

impl From<MarkerKind> for DiagnosticSeverity {
    fn from(kind: MarkerKind) -> Self {
        match kind {
            MarkerKind::Info => DiagnosticSeverity::Information,
            MarkerKind::Warning => DiagnosticSeverity::Warning,
            // Unrecognized kinds fall back to the editor default.
            MarkerKind::Error | MarkerKind::Unknown => DiagnosticSeverity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// The `(0,0)-(0,0)` range. Markers carry no text position.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// A diagnostic published to the editor for a diagram document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    pub message: String,
    pub severity: DiagnosticSeverity,
}

impl From<&Marker> for Diagnostic {
    fn from(marker: &Marker) -> Self {
        Self {
            range: Range::zero(),
            message: marker.description.clone(),
            severity: marker.kind.into(),
        }
    }
}

/// Diagnostics per document URI.
#[derive(Debug, Default)]
pub struct DiagnosticsState {
    by_uri: RwLock<HashMap<String, Vec<Diagnostic>>>,
}

impl DiagnosticsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the diagnostics of `uri`.
    pub fn set(&self, uri: &str, diagnostics: Vec<Diagnostic>) {
        let mut by_uri = self.by_uri.write().unwrap_or_else(|e| e.into_inner());
        by_uri.insert(uri.to_string(), diagnostics);
    }

    pub fn get(&self, uri: &str) -> Vec<Diagnostic> {
        let by_uri = self.by_uri.read().unwrap_or_else(|e| e.into_inner());
        by_uri.get(uri).cloned().unwrap_or_default()
    }

    /// Remove the diagnostics of `uri`. Returns true if any were stored.
    pub fn clear_uri(&self, uri: &str) -> bool {
        let mut by_uri = self.by_uri.write().unwrap_or_else(|e| e.into_inner());
        by_uri.remove(uri).is_some()
    }

    pub fn uris(&self) -> Vec<String> {
        let by_uri = self.by_uri.read().unwrap_or_else(|e| e.into_inner());
        let mut uris: Vec<String> = by_uri.keys().cloned().collect();
        uris.sort();
        uris
    }

    pub fn clear(&self) {
        let mut by_uri = self.by_uri.write().unwrap_or_else(|e| e.into_inner());
        by_uri.clear();
    }
}
