//! Error types for the core crate.

use thiserror::Error;

/// Errors surfaced by the router and the document lifecycle bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No live client is registered for the document.
    #[error("no diagram client registered for document: {uri}")]
    NotRegistered { uri: String },

    /// The client went away before the pending operation completed.
    #[error("diagram client disposed before completion: {client_id}")]
    ClientDisposed { client_id: String },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn not_registered(uri: impl Into<String>) -> Self {
        Self::NotRegistered { uri: uri.into() }
    }

    pub fn client_disposed(client_id: impl Into<String>) -> Self {
        Self::ClientDisposed {
            client_id: client_id.into(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },

    /// An override could not be interpreted.
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases: Vec<(BridgeError, &str)> = vec![
            (
                BridgeError::not_registered("file:///a.wf"),
                "no diagram client registered for document: file:///a.wf",
            ),
            (
                BridgeError::client_disposed("workflow_0"),
                "diagram client disposed before completion: workflow_0",
            ),
            (
                ConfigError::EnvVarNotFound {
                    name: "PORT".to_string(),
                }
                .into(),
                "config error: environment variable not found: PORT",
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }
}
