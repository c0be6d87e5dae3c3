//! GLSP server side of the bridge.
//!
//! - [`ServerProcess`] launches the Java server and waits for it to accept
//!   connections.
//! - [`ServerAdapter`] connects a [`glsp_bridge_core::ServerChannel`] to the
//!   server over TCP using `Content-Length` framed JSON-RPC.

pub mod connection;
pub mod error;
pub mod jsonrpc;
pub mod launcher;

pub use connection::{application_id, ServerAdapter, ServerAdapterOptions};
pub use error::{ServerError, ServerResult};
pub use launcher::{ServerLaunchOptions, ServerProcess, STARTUP_COMPLETE_MARKER};
