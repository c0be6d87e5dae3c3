//! Shared protocol types for the GLSP editor bridge.
//!
//! This crate defines the messages exchanged between:
//! - the diagram webview (the GLSP client)
//! - the GLSP diagram server
//! - the editor-side router in `glsp-bridge-core`
//!
//! Every message is an [`ActionMessage`] envelope: a client identifier plus an
//! opaque action object whose `kind` names the action. Only the actions the
//! bridge reacts to or produces itself are typed in [`Action`]; everything
//! else travels as raw JSON.

mod action;
mod message;

pub use action::*;
pub use message::{is_action_message, ActionMessage, DiagramIdentifier, WebviewReadyMessage};
