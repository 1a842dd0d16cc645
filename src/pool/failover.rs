//! Priority failover selection strategy.

use crate::pool::strategy::SelectionStrategy;

/// Always prefers members in declared order; no persistent cursor.
#[derive(Debug, Default)]
pub struct PriorityFailover;

impl PriorityFailover {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for PriorityFailover {
    fn next_candidate(&self, available: &[bool]) -> Option<usize> {
        available.iter().position(|a| *a)
    }
}
