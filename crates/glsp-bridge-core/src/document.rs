//! Diagram documents as seen by the router.
//!
//! The host editor owns persistence. The router only needs a stable identity
//! per opened document (two panels on the same path are two documents) and
//! its URI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Static regex for percent-encoded Windows drive letters, compiled once.
static DRIVE_REGEX: OnceLock<regex::Regex> = OnceLock::new();

fn drive_regex() -> &'static regex::Regex {
    DRIVE_REGEX.get_or_init(|| {
        regex::Regex::new(r"(?i)^file:///([a-z])%3A")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Process-unique identity of an opened document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(u64);

impl DocumentId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc_{}", self.0)
    }
}

/// A diagram source file opened in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramDocument {
    id: DocumentId,
    uri: String,
}

impl DiagramDocument {
    /// Open a new document for `uri` with a fresh identity.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            id: DocumentId::next(),
            uri: uri.into(),
        }
    }

    pub fn with_id(id: DocumentId, uri: impl Into<String>) -> Self {
        Self {
            id,
            uri: uri.into(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

/// Result of backing up a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBackup {
    /// Identifier the host uses to restore the backup; the backup destination.
    pub id: String,
}

/// Normalize a URI for the diagram server.
///
/// Editors percent-encode the colon of Windows drive letters
/// (`file:///c%3A/...`); the server expects `file:///c:/...`.
pub fn serialize_uri(uri: &str) -> String {
    match drive_regex().captures(uri) {
        Some(caps) => {
            let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
            let drive = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            format!("file:///{}:{}", drive, &uri[whole..])
        }
        None => uri.to_string(),
    }
}
