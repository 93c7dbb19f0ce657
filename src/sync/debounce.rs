//! Debounced canvas broadcast.
//!
//! DESIGN
//! ======
//! A burst of local mutations (a dozen resize ticks during a drag) must
//! produce one network message carrying only the final state. This is a
//! trailing-edge debounce with a single-shot deadline: every queued
//! snapshot replaces the pending one and resets the deadline, and the
//! controller flushes whatever is pending once the deadline passes. At
//! most one emit is ever pending.

use std::time::Duration;

use tokio::time::Instant;

/// Reference debounce window for canvas broadcasts.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(120);

#[derive(Debug)]
pub struct CanvasDebouncer {
    delay: Duration,
    pending: Option<String>,
    deadline: Option<Instant>,
}

impl CanvasDebouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay, pending: None, deadline: None }
    }

    /// Queue a snapshot for broadcast, replacing any pending snapshot and
    /// resetting the deadline.
    pub fn queue(&mut self, canvas_json: String) {
        self.pending = Some(canvas_json);
        self.deadline = Some(Instant::now() + self.delay);
    }

    /// The instant the pending snapshot becomes due, if one is pending.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Take the pending snapshot if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Drop the pending snapshot without emitting it.
    pub fn clear(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }
}

impl Default for CanvasDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
#[path = "debounce_test.rs"]
mod tests;
