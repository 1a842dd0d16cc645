//! Read-your-writes stickiness registry.
//!
//! Maps an engine identity to the instant until which it must be served by
//! the primary. Expiry is purely time-based; a zero-duration stick pins the
//! identity until the next [`StickyContext::release`] or
//! [`StickyContext::reset`] at a unit-of-work boundary.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, Clone, Copy, Default)]
struct StickEntry {
    until: Option<Instant>,
    until_reset: bool,
}

/// Thread-safe stickiness registry shared by engines.
#[derive(Debug, Clone)]
pub struct StickyContext {
    inner: Arc<DashMap<String, StickEntry>>,
    clock: Arc<dyn Clock>,
}

impl StickyContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Process-wide registry on the system clock.
    pub fn shared() -> Self {
        static SHARED: OnceLock<StickyContext> = OnceLock::new();
        SHARED.get_or_init(|| StickyContext::new(Arc::new(SystemClock))).clone()
    }

    /// Stick `id` to the primary for `duration` from now.
    ///
    /// Extends but never shortens an existing window.
    pub fn stick(&self, id: &str, duration: Duration) {
        let now = self.clock.now();
        let mut entry = self.inner.entry(id.to_string()).or_default();
        if duration.is_zero() {
            entry.until_reset = true;
        } else {
            let until = now + duration;
            entry.until = Some(entry.until.map_or(until, |current| current.max(until)));
        }
    }

    pub fn is_stuck(&self, id: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .get(id)
            .is_some_and(|entry| entry.until_reset || entry.until.is_some_and(|until| now < until))
    }

    /// Time left on a timed stick, if any.
    pub fn remaining(&self, id: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.inner
            .get(id)
            .and_then(|entry| entry.until)
            .and_then(|until| until.checked_duration_since(now))
            .filter(|d| !d.is_zero())
    }

    /// Forget any stick for `id`.
    pub fn release(&self, id: &str) {
        self.inner.remove(id);
    }

    /// Forget every stick.
    pub fn reset(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
