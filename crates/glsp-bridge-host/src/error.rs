//! Host transport errors.

use crate::types::JsonRpcError;

/// Transport error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response")]
    InvalidResponse,

    /// The host answered a request with an error.
    #[error("Host error {}: {}", .0.code, .0.message)]
    Remote(JsonRpcError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (TransportError::ChannelClosed, "Channel closed"),
            (TransportError::Timeout, "Request timed out"),
            (TransportError::InvalidResponse, "Invalid response"),
            (
                TransportError::Remote(JsonRpcError::internal_error("no editor")),
                "Host error -32603: no editor",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }
}
