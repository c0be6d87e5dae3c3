//! State that lives next to a diagram webview rather than in the router.

pub mod context_menu;

pub use context_menu::{ContextMenu, MenuMode, MenuPosition};
