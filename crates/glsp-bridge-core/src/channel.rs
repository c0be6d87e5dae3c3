//! The router's side of the connection to a GLSP server.

use serde_json::Value;

use crate::event::Emitter;

/// Two emitters connecting the router with a server transport.
///
/// The router fires messages for the server on `to_server` and listens on
/// `from_server`. A transport does the opposite.
#[derive(Clone, Default)]
pub struct ServerChannel {
    pub to_server: Emitter<Value>,
    pub from_server: Emitter<Value>,
}

impl ServerChannel {
    pub fn new() -> Self {
        Self::default()
    }
}
