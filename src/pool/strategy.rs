//! Selection strategies and the registry that builds them.
//!
//! A strategy only sees which members are currently available; it never
//! touches health state itself. Built-in strategies are resolved by name,
//! anything else must be registered up front.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RouteError, RouteResult};
use crate::pool::failover::PriorityFailover;
use crate::pool::round_robin::RoundRobin;

/// Picks the next member to try.
pub trait SelectionStrategy: Send + Sync + fmt::Debug {
    /// Return the index of the next candidate, or `None` if nothing in
    /// `available` is usable. `available[i]` is the health of member `i`.
    fn next_candidate(&self, available: &[bool]) -> Option<usize>;
}

/// Builds a strategy for a pool, given its member weights in declared order.
pub type StrategyFactory = Arc<dyn Fn(&[u32]) -> Box<dyn SelectionStrategy> + Send + Sync>;

/// Strategy name as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyKind {
    RoundRobin,
    Failover,
    Custom(String),
}

impl StrategyKind {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "" | "round_robin" => StrategyKind::RoundRobin,
            "failover" | "priority_failover" => StrategyKind::Failover,
            other => StrategyKind::Custom(other.to_string()),
        }
    }
}

/// Closed set of built-in strategies plus externally registered ones.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    custom: HashMap<String, StrategyFactory>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy under `name`. Built-in names cannot be shadowed.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&[u32]) -> Box<dyn SelectionStrategy> + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn build(&self, name: &str, weights: &[u32]) -> RouteResult<Box<dyn SelectionStrategy>> {
        match StrategyKind::parse(name) {
            StrategyKind::RoundRobin => Ok(Box::new(RoundRobin::with_weights(weights))),
            StrategyKind::Failover => Ok(Box::new(PriorityFailover::new())),
            StrategyKind::Custom(name) => self
                .custom
                .get(&name)
                .map(|factory| factory(weights))
                .ok_or_else(|| {
                    RouteError::Configuration(format!("unknown selection strategy '{}'", name))
                }),
        }
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}
