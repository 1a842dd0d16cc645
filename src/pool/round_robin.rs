//! Round-robin selection strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::schema::MAX_WEIGHT;
use crate::pool::strategy::SelectionStrategy;

/// Round-robin selector.
/// Rotates through a slot table in which each member appears `weight` times.
/// The cursor persists across calls and always points one past the slot
/// last returned.
#[derive(Debug)]
pub struct RoundRobin {
    slots: Vec<usize>,
    cursor: AtomicUsize,
}

impl RoundRobin {
    /// Unweighted rotation over `members` entries.
    pub fn new(members: usize) -> Self {
        Self::with_weights(&vec![1; members])
    }

    /// Weights are clamped to `1..=MAX_WEIGHT`.
    pub fn with_weights(weights: &[u32]) -> Self {
        let slots = weights
            .iter()
            .enumerate()
            .flat_map(|(index, weight)| {
                std::iter::repeat(index).take((*weight).clamp(1, MAX_WEIGHT) as usize)
            })
            .collect();
        Self {
            slots,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl SelectionStrategy for RoundRobin {
    fn next_candidate(&self, available: &[bool]) -> Option<usize> {
        let len = self.slots.len();
        if len == 0 {
            return None;
        }

        let start = self.cursor.load(Ordering::Relaxed) % len;
        for offset in 0..len {
            let slot = (start + offset) % len;
            let index = self.slots[slot];
            if available.get(index).copied().unwrap_or(false) {
                // Racing callers may overwrite each other; the cursor stays in range.
                self.cursor.store((slot + 1) % len, Ordering::Relaxed);
                return Some(index);
            }
        }
        None
    }
}
