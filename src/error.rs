//! Error taxonomy surfaced at the router boundary.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Role;

/// Error type returned by routed operations and physical connections.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced by the routing engine.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A connection-level failure that could not be retried elsewhere.
    #[error("connection '{connection}' failed: {source}")]
    Connection {
        connection: String,
        #[source]
        source: BoxError,
    },

    /// Any other failure from the underlying call, passed through untouched.
    #[error(transparent)]
    Query(BoxError),

    /// The pool has members but none of them is currently available.
    #[error("[{role}] all connections are blacklisted{}", format_errors(.errors))]
    AllConnectionsBlacklisted { role: Role, errors: Vec<String> },

    /// The pool has no members at all.
    #[error("[{role}] no connections available")]
    NoConnectionsAvailable { role: Role },

    /// An integration broke the engine's contract.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The engine could not be built from its configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

fn format_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(" -> {}", errors.join(" -> "))
    }
}

impl RouteError {
    /// True for the two pool exhaustion variants.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            RouteError::AllConnectionsBlacklisted { .. } | RouteError::NoConnectionsAvailable { .. }
        )
    }

    /// Role of the exhausted pool, if this is an exhaustion error.
    pub fn role(&self) -> Option<Role> {
        match self {
            RouteError::AllConnectionsBlacklisted { role, .. }
            | RouteError::NoConnectionsAvailable { role } => Some(*role),
            _ => None,
        }
    }

    /// Unwrap the original error of a pass-through or connection failure.
    pub fn into_source(self) -> Option<BoxError> {
        match self {
            RouteError::Query(source) | RouteError::Connection { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for routing operations.
pub type RouteResult<T> = Result<T, RouteError>;

/// The error a connection failed with while it was being established.
///
/// Re-surfaced on every use of the placeholder connection; always classified
/// as connection-level.
#[derive(Debug, Clone, Error)]
#[error("could not connect to '{connection}': {source}")]
pub struct ConnectFailure {
    pub connection: String,
    #[source]
    pub source: Arc<dyn StdError + Send + Sync + 'static>,
}

impl ConnectFailure {
    pub fn new(connection: impl Into<String>, source: BoxError) -> Self {
        Self {
            connection: connection.into(),
            source: Arc::from(source),
        }
    }
}
