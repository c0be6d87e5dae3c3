//! Editor-side routing core of the GLSP bridge.
//!
//! This crate sits between three asynchronous actors:
//! - the host editor's document lifecycle (open/save/revert/backup)
//! - diagram webviews, one [`GlspClient`] per open panel
//! - an out-of-process GLSP server, reached through a [`ServerChannel`]
//!
//! The [`Router`] forwards envelopes between clients and the server, runs
//! the built-in reactions (dirty state, markers, selection, navigation, SVG
//! export) and keeps the derived selection and diagnostics state.

pub mod channel;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod focus;
pub mod host;
pub mod interceptor;
pub mod lifecycle;
pub mod registry;
pub mod router;
pub mod state;

pub use channel::ServerChannel;
pub use client::{ClientIdGenerator, GlspClient, PanelId, WebviewPanel};
pub use config::Config;
pub use document::{serialize_uri, DiagramDocument, DocumentBackup, DocumentId};
pub use error::{BridgeError, BridgeResult, ConfigError};
pub use event::{DisposableStore, Emitter, Subscription};
pub use focus::PanelFocusTracker;
pub use host::{EditorHost, NoopHost, SaveDialogOptions};
pub use interceptor::{Continuation, InterceptorConfig, Origin, PropagateHook, ReceiveHook};
pub use lifecycle::{DiagramEditorProvider, EditorProviderWrapper};
pub use registry::ClientRegistry;
pub use router::{DiagnosticsChanged, DocumentEdit, Router, RouterOptions};
pub use state::{Diagnostic, DiagnosticSeverity, DiagnosticsState, Position, Range, SelectionState};
