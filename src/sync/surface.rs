//! Rendering-surface boundary: mutation reporting with echo suppression.
//!
//! DESIGN
//! ======
//! The rendering surface reports every local mutation here. Applying a
//! snapshot that arrived from the relay also fires the surface's mutation
//! observer, which would immediately re-broadcast the just-applied remote
//! state; a re-entrancy flag swallows those reports. The flag is a plain
//! `Cell<bool>` — the canvas, its observer, and this guard all live in one
//! single-threaded client context, so no cross-thread synchronization is
//! involved.

use std::cell::Cell;

use tokio::sync::mpsc;

use super::controller::LocalChange;

pub struct SurfaceSync {
    applying_remote: Cell<bool>,
    changes: mpsc::UnboundedSender<LocalChange>,
}

impl SurfaceSync {
    #[must_use]
    pub fn new(changes: mpsc::UnboundedSender<LocalChange>) -> Self {
        Self { applying_remote: Cell::new(false), changes }
    }

    /// Report a local canvas mutation. Suppressed while a remote snapshot
    /// is being applied.
    pub fn notify_mutation(&self, canvas_json: String) {
        if self.applying_remote.get() {
            return;
        }
        let _ = self.changes.send(LocalChange::Canvas(canvas_json));
    }

    /// Report a local pointer move. Cursor positions are not debounced or
    /// echo-suppressed; they never originate from remote application.
    pub fn notify_cursor(&self, x: f64, y: f64) {
        let _ = self.changes.send(LocalChange::Cursor { x, y });
    }

    /// Apply a remote snapshot to the surface with the echo guard held,
    /// so mutation reports fired by the application itself are dropped.
    pub fn apply_remote(&self, canvas_json: &str, apply: impl FnOnce(&str)) {
        self.applying_remote.set(true);
        apply(canvas_json);
        self.applying_remote.set(false);
    }
}

#[cfg(test)]
#[path = "surface_test.rs"]
mod tests;
