//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! Routing engine picks a role
//!     → pool.rs (snapshot member availability)
//!     → Apply selection strategy:
//!         - round_robin.rs (weighted rotation, persistent cursor)
//!         - failover.rs (declared order, first available wins)
//!         - custom strategies from strategy.rs registry
//!     → connection.rs (run the operation on the chosen member)
//!     → On connection-level failure: blacklist, select again
//! ```
//!
//! # Design Decisions
//! - Strategies only see availability; health lives on each member
//! - Availability is re-read on every selection, never cached
//! - One pool per role, owned by the routing engine

pub mod connection;
pub mod failover;
#[allow(clippy::module_inception)]
pub mod pool;
pub mod round_robin;
pub mod strategy;

pub use connection::{Connection, ConnectionHealth, Handle, MemberStatus};
pub use failover::PriorityFailover;
pub use pool::{Pool, PoolStatus};
pub use round_robin::RoundRobin;
pub use strategy::{SelectionStrategy, StrategyFactory, StrategyKind, StrategyRegistry};
