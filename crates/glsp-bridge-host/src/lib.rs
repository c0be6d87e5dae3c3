//! Host editor side of the GLSP bridge.
//!
//! The host editor (the process that owns documents and webview panels)
//! talks to the bridge with newline-delimited JSON-RPC over stdio. This
//! crate provides the transport, the [`HostBridge`] that maps host requests
//! onto the router, and the relay between router clients and webviews.

pub mod bridge;
pub mod commands;
pub mod error;
pub mod host;
pub mod transport;
pub mod types;
pub mod webview;

pub use bridge::HostBridge;
pub use commands::EditorCommand;
pub use error::TransportError;
pub use host::StdioHost;
pub use transport::{IncomingMessage, Transport};
pub use webview::WebviewEndpoint;
