//! Synchronous event emitters with revocable subscriptions.
//!
//! Unlike the broadcast-based buses used for cross-task notifications, an
//! [`Emitter`] calls its listeners inline, in subscription order, inside
//! [`Emitter::fire`]. The router relies on this: an envelope is fully
//! intercepted, processed and dispatched before `fire` returns, so messages
//! from one channel are handled in arrival order.
//!
//! # Example
//!
//! ```
//! use glsp_bridge_core::Emitter;
//!
//! let emitter = Emitter::<String>::new();
//! let subscription = emitter.on(|message| println!("got {}", message));
//! emitter.fire("hello".to_string());
//! drop(subscription); // listener removed
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct EmitterInner<T> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    disposed: AtomicBool,
}

/// A typed, synchronous event source.
///
/// Cloning an emitter yields another handle to the same listener list.
pub struct Emitter<T> {
    inner: Arc<EmitterInner<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EmitterInner {
                next_id: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped or disposed.
    pub fn on<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return Subscription::empty();
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(listener)));

        let weak: Weak<EmitterInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .listeners
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    /// Invoke every listener with `event`.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe,
    /// unsubscribe or fire again without deadlocking.
    pub fn fire(&self, event: T) {
        let listeners: Vec<Listener<T>> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Drop all listeners. Later subscriptions are inert.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + 'static> Emitter<T> {
    /// Receive events on an async channel instead of a callback.
    ///
    /// The channel is fed for as long as the returned subscription lives.
    pub fn subscribe(&self) -> (mpsc::UnboundedReceiver<T>, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.on(move |event: &T| {
            let _ = tx.send(event.clone());
        });
        (rx, subscription)
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a registered listener. Dropping it unregisters the listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    revoke: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(revoke: impl FnOnce() + Send + 'static) -> Self {
        Self {
            revoke: Some(Box::new(revoke)),
        }
    }

    /// A subscription with nothing to revoke.
    pub fn empty() -> Self {
        Self { revoke: None }
    }

    pub fn dispose(mut self) {
        self.revoke_now();
    }

    fn revoke_now(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.revoke_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.revoke.is_some())
            .finish()
    }
}

/// A bundle of subscriptions released together.
///
/// Subscriptions added after [`DisposableStore::dispose`] are revoked
/// immediately.
pub struct DisposableStore {
    subscriptions: Mutex<Option<Vec<Subscription>>>,
}

impl DisposableStore {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn add(&self, subscription: Subscription) {
        let rejected = {
            let mut guard = self.subscriptions.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_mut() {
                Some(list) => {
                    list.push(subscription);
                    None
                }
                None => Some(subscription),
            }
        };
        drop(rejected);
    }

    /// Revoke every subscription. Calling it again does nothing.
    pub fn dispose(&self) {
        let taken = self
            .subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        // Revoke outside the lock; revocation may re-enter emitters.
        drop(taken);
    }

    pub fn is_disposed(&self) -> bool {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    pub fn len(&self) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DisposableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DisposableStore {
    fn drop(&mut self) {
        self.dispose();
    }
}
