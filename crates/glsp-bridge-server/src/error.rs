//! GLSP server error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while launching or talking to a GLSP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured jar does not exist.
    #[error("Could not launch GLSP server. The given jar path is not valid: {}", .0.display())]
    JarNotFound(PathBuf),

    /// The java executable could not be spawned.
    #[error("Failed to spawn {0}. Perhaps it is not on the PATH")]
    JavaNotFound(String),

    /// Server process failed.
    #[error("Server process error: {0}")]
    ProcessError(String),

    /// The process exited before reporting startup.
    #[error("Server exited before startup completed (status: {0})")]
    Exited(String),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Request failed.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Server timeout.
    #[error("Server timeout")]
    Timeout,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed(message.into())
    }

    /// Create a protocol error.
    pub fn protocol_error(message: impl Into<String>) -> Self {
        Self::ProtocolError(message.into())
    }

    /// Create a request failed error.
    pub fn request_failed(message: impl Into<String>) -> Self {
        Self::RequestFailed(message.into())
    }
}
