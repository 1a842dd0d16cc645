//! Primary/replica routing for database connections.
//!
//! Sends writes to a primary pool and reads to a replica pool, pins a
//! session to the primary after it writes, and survives connection
//! failures by blacklisting members and escalating to the other pool.

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod observability;
pub mod pool;
pub mod resilience;
pub mod routing;

pub use config::{ConnectionConfig, Role, RouterConfig};
pub use context::StickyContext;
pub use error::{BoxError, ConnectFailure, RouteError, RouteResult};
pub use pool::{Connection, ConnectionHealth, Pool, SelectionStrategy};
pub use resilience::ErrorClassifier;
pub use routing::{Connector, EngineBuilder, OperationSpec, RouteReason, RoutingEngine};
