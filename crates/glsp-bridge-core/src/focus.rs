//! Tracks whether any diagram panel has focus.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::{PanelId, WebviewPanel};
use crate::event::{DisposableStore, Emitter, Subscription};

struct TrackerInner {
    active: Mutex<Option<PanelId>>,
    focus_changed: Emitter<bool>,
    /// Listeners on each open panel, released when the panel closes.
    panels: Mutex<HashMap<PanelId, DisposableStore>>,
}

/// Reports `true` when a tracked panel gains focus and `false` when the
/// focused panel loses it or is closed.
#[derive(Clone)]
pub struct PanelFocusTracker {
    inner: Arc<TrackerInner>,
}

impl PanelFocusTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                active: Mutex::new(None),
                focus_changed: Emitter::new(),
                panels: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn on_focus_changed(&self, listener: impl Fn(&bool) + Send + Sync + 'static) -> Subscription {
        self.inner.focus_changed.on(listener)
    }

    /// The focused panel, if one is tracked.
    pub fn active_panel(&self) -> Option<PanelId> {
        *self.inner.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of open panels being tracked.
    pub fn panel_count(&self) -> usize {
        self.inner.panels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn register_panel(&self, panel: &WebviewPanel) {
        if panel.is_disposed() {
            return;
        }
        let panel_id = panel.id();
        if panel.is_active() {
            self.activate(panel_id);
        }

        let store = DisposableStore::new();
        let weak = Arc::downgrade(&self.inner);
        store.add(panel.on_did_change_view_state(move |active| {
            if let Some(inner) = weak.upgrade() {
                let tracker = PanelFocusTracker { inner };
                if *active {
                    tracker.activate(panel_id);
                } else {
                    tracker.deactivate(panel_id);
                }
            }
        }));

        let weak = Arc::downgrade(&self.inner);
        store.add(panel.on_did_dispose(move |_| {
            if let Some(inner) = weak.upgrade() {
                let tracker = PanelFocusTracker { inner };
                tracker.deactivate(panel_id);
                tracker.release(panel_id);
            }
        }));

        let replaced = self
            .inner
            .panels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(panel_id, store);
        drop(replaced);
    }

    fn release(&self, panel_id: PanelId) {
        let store = self
            .inner
            .panels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&panel_id);
        // Revoke outside the lock.
        drop(store);
    }

    fn activate(&self, panel_id: PanelId) {
        *self.inner.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(panel_id);
        self.inner.focus_changed.fire(true);
    }

    fn deactivate(&self, panel_id: PanelId) {
        let was_active = {
            let mut active = self.inner.active.lock().unwrap_or_else(|e| e.into_inner());
            if *active == Some(panel_id) {
                *active = None;
                true
            } else {
                false
            }
        };
        if was_active {
            self.inner.focus_changed.fire(false);
        }
    }
}

impl Default for PanelFocusTracker {
    fn default() -> Self {
        Self::new()
    }
}
