//! Hooks that observe, rewrite or veto messages passing the router.
//!
//! Each direction has two stages:
//! - a receive hook, called with the raw message and a [`Continuation`]. It
//!   decides which message continues and whether the router's built-in
//!   processing runs. Dropping the continuation drops the message.
//! - a propagate hook, called with the message that left the receive stage,
//!   the processed message (absent when processing consumed it) and whether
//!   processing changed it. Its return value is what gets dispatched.
//!
//! All hooks default to pass-through.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Where a message entered the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// A diagram webview.
    Client,
    /// The GLSP server.
    Server,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Client => write!(f, "client"),
            Origin::Server => write!(f, "server"),
        }
    }
}

/// Resumes routing after a receive hook.
///
/// It may be called later, from another task. If it is dropped without being
/// called, the message is discarded.
#[must_use = "dropping a Continuation discards the message"]
pub struct Continuation {
    resume: Box<dyn FnOnce(Option<Value>, bool) + Send>,
}

impl Continuation {
    pub fn new(resume: impl FnOnce(Option<Value>, bool) + Send + 'static) -> Self {
        Self {
            resume: Box::new(resume),
        }
    }

    /// Continue with `message`. `process` enables the built-in processing.
    pub fn proceed(self, message: Option<Value>, process: bool) {
        (self.resume)(message, process)
    }

    /// Continue with `message` and built-in processing enabled.
    pub fn pass(self, message: Value) {
        self.proceed(Some(message), true)
    }

    /// Forward `message` without built-in processing.
    pub fn skip_processing(self, message: Value) {
        self.proceed(Some(message), false)
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Continuation")
    }
}

/// Receive-stage hook.
#[derive(Clone)]
pub struct ReceiveHook(Arc<dyn Fn(Value, Continuation) + Send + Sync>);

impl ReceiveHook {
    pub fn new(hook: impl Fn(Value, Continuation) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    /// Continue unchanged with processing enabled.
    pub fn pass_through() -> Self {
        Self::new(|message, next| next.pass(message))
    }

    pub fn call(&self, message: Value, next: Continuation) {
        (self.0)(message, next)
    }
}

impl Default for ReceiveHook {
    fn default() -> Self {
        Self::pass_through()
    }
}

type PropagateFn = dyn Fn(Option<&Value>, Option<Value>, bool) -> Option<Value> + Send + Sync;

/// Propagate-stage hook.
#[derive(Clone)]
pub struct PropagateHook(Arc<PropagateFn>);

impl PropagateHook {
    pub fn new(
        hook: impl Fn(Option<&Value>, Option<Value>, bool) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(hook))
    }

    /// Dispatch the processed message.
    pub fn pass_through() -> Self {
        Self::new(|_original, processed, _changed| processed)
    }

    pub fn call(&self, original: Option<&Value>, processed: Option<Value>, changed: bool) -> Option<Value> {
        (self.0)(original, processed, changed)
    }
}

impl Default for PropagateHook {
    fn default() -> Self {
        Self::pass_through()
    }
}

/// The four hooks of a router.
#[derive(Clone, Default)]
pub struct InterceptorConfig {
    pub before_receive_from_client: ReceiveHook,
    pub before_receive_from_server: ReceiveHook,
    pub before_propagate_to_server: PropagateHook,
    pub before_propagate_to_client: PropagateHook,
}

impl InterceptorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_receive_from_client(
        mut self,
        hook: impl Fn(Value, Continuation) + Send + Sync + 'static,
    ) -> Self {
        self.before_receive_from_client = ReceiveHook::new(hook);
        self
    }

    pub fn on_receive_from_server(
        mut self,
        hook: impl Fn(Value, Continuation) + Send + Sync + 'static,
    ) -> Self {
        self.before_receive_from_server = ReceiveHook::new(hook);
        self
    }

    pub fn on_propagate_to_server(
        mut self,
        hook: impl Fn(Option<&Value>, Option<Value>, bool) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.before_propagate_to_server = PropagateHook::new(hook);
        self
    }

    pub fn on_propagate_to_client(
        mut self,
        hook: impl Fn(Option<&Value>, Option<Value>, bool) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.before_propagate_to_client = PropagateHook::new(hook);
        self
    }

    /// Receive hook for messages entering from `origin`.
    pub fn receive_hook(&self, origin: Origin) -> &ReceiveHook {
        match origin {
            Origin::Client => &self.before_receive_from_client,
            Origin::Server => &self.before_receive_from_server,
        }
    }

    /// Propagate hook for messages that entered from `origin`.
    pub fn propagate_hook(&self, origin: Origin) -> &PropagateHook {
        match origin {
            Origin::Client => &self.before_propagate_to_server,
            Origin::Server => &self.before_propagate_to_client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_default_hooks_pass_through() {
        let config = InterceptorConfig::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = seen.clone();

        config.receive_hook(Origin::Server).call(
            json!({"a": 1}),
            Continuation::new(move |message, process| {
                *sink.lock().unwrap() = Some((message, process));
            }),
        );
        assert_eq!(*seen.lock().unwrap(), Some((Some(json!({"a": 1})), true)));

        let out = config
            .propagate_hook(Origin::Client)
            .call(Some(&json!(1)), Some(json!(2)), true);
        assert_eq!(out, Some(json!(2)));
    }

    #[test]
    fn test_dropped_continuation_never_resumes() {
        let config = InterceptorConfig::new().on_receive_from_client(|_message, next| drop(next));
        let resumed = Arc::new(Mutex::new(false));
        let flag = resumed.clone();

        config.receive_hook(Origin::Client).call(
            json!({}),
            Continuation::new(move |_, _| *flag.lock().unwrap() = true),
        );
        assert!(!*resumed.lock().unwrap());
    }

    #[test]
    fn test_propagate_hook_selection_by_origin() {
        let config = InterceptorConfig::new()
            .on_propagate_to_server(|_, _, _| Some(json!("to-server")))
            .on_propagate_to_client(|_, _, _| None);

        assert_eq!(
            config.propagate_hook(Origin::Client).call(None, None, false),
            Some(json!("to-server"))
        );
        assert_eq!(
            config
                .propagate_hook(Origin::Server)
                .call(None, Some(json!(1)), false),
            None
        );
    }
}
