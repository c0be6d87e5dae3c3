//! Testing utilities and test doubles for the GLSP bridge.
//!
//! - **Mocks**: [`RecordingHost`], an editor host that records calls
//! - **Probes**: [`ChannelProbe`], records everything fired on an emitter
//! - **Builders**: shortcuts for clients and action envelopes
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use glsp_bridge_test_utils::{builders, ChannelProbe};
//!
//! let opened = builders::open_client(&router, "wf_0", "file:///a.wf", true);
//! opened.client.from_client().fire(builders::envelope("wf_0", json!({"kind": "fit"})));
//! assert_eq!(server_probe.len(), 1);
//! ```

pub mod builders;
pub mod mocks;
pub mod probe;

pub use builders::OpenedClient;
pub use mocks::{HostCall, RecordingHost};
pub use probe::ChannelProbe;
