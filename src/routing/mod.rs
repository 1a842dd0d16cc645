//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Operation (name or OperationSpec + closure over the connection)
//!     → dispatch.rs (capability lookup; reentrant calls go to the held connection)
//!     → engine.rs (decide primary or replica, apply stickiness)
//!     → pool::Pool::provide (select, run, blacklist, retry)
//!     → engine.rs escalation (replica → primary fallback, primary reset)
//!
//! Engine construction (at startup):
//!     RouterConfig
//!     → builder.rs (connect members, resolve strategies)
//!     → RoutingEngine
//! ```
//!
//! # Design Decisions
//! - Decision order is fixed; the first matching rule wins
//! - Transient scope flags are per thread (scope.rs), never engine fields
//! - Pools and strategies are immutable after construction; only health
//!   state and cursors change

pub mod builder;
pub mod dispatch;
pub mod engine;
pub mod scope;

pub use builder::{Connector, EngineBuilder};
pub use dispatch::{OperationKind, OperationSpec, OperationTable};
pub use engine::{EngineStatus, RouteDecision, RouteReason, RoutingEngine};
