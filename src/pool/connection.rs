//! Connection health wrapper.
//!
//! # Responsibilities
//! - Hold one physical connection (or the error it failed to connect with)
//! - Track the blacklist window and the last recorded error
//! - Answer availability for a given instant

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::config::{ConnectionConfig, Role};
use crate::error::{BoxError, ConnectFailure};

/// Session state the router needs from a physical connection.
pub trait Connection: Send + Sync {
    /// True while the connection has an open transaction.
    fn in_transaction(&self) -> bool {
        false
    }
}

/// The physical connection, or a stand-in for one that never came up.
#[derive(Debug)]
pub enum Handle<C> {
    Ready(C),
    Failed(ConnectFailure),
}

#[derive(Debug, Default)]
struct HealthState {
    blacklisted_until: Option<Instant>,
    last_error: Option<String>,
}

/// One pool member with its health state.
#[derive(Debug)]
pub struct ConnectionHealth<C> {
    name: String,
    role: Role,
    weight: u32,
    handle: Handle<C>,
    state: Mutex<HealthState>,
}

impl<C: Connection> ConnectionHealth<C> {
    pub fn new(config: &ConnectionConfig, connection: C) -> Self {
        Self::with_handle(config, Handle::Ready(connection))
    }

    /// Build the placeholder for a connection that could not be established.
    ///
    /// Every use re-surfaces `error` as a connection-level failure, so the
    /// member takes part in blacklisting instead of failing construction.
    pub fn wrap_connect_failure(config: &ConnectionConfig, error: BoxError) -> Self {
        tracing::warn!(
            connection = %config.name,
            role = %config.role,
            error = %error,
            "Connection could not be established, installing placeholder"
        );
        Self::with_handle(config, Handle::Failed(ConnectFailure::new(&config.name, error)))
    }

    fn with_handle(config: &ConnectionConfig, handle: Handle<C>) -> Self {
        Self {
            name: config.name.clone(),
            role: config.role,
            weight: config.weight.max(1),
            handle,
            state: Mutex::new(HealthState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// The underlying connection, if it was established.
    pub fn connection(&self) -> Option<&C> {
        match &self.handle {
            Handle::Ready(conn) => Some(conn),
            Handle::Failed(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.handle, Handle::Failed(_))
    }

    pub fn in_transaction(&self) -> bool {
        self.connection().is_some_and(Connection::in_transaction)
    }

    /// Run `op` against the underlying connection.
    pub fn run<T, F>(&self, op: F) -> Result<T, BoxError>
    where
        F: FnOnce(&C) -> Result<T, BoxError>,
    {
        match &self.handle {
            Handle::Ready(conn) => op(conn),
            Handle::Failed(failure) => Err(Box::new(failure.clone())),
        }
    }

    // --- Health Logic ---

    /// Exclude this member until `now + duration`.
    pub fn blacklist(&self, now: Instant, duration: Duration) {
        self.state.lock().blacklisted_until = Some(now + duration);
    }

    /// Make this member eligible again.
    pub fn whitelist(&self) {
        self.state.lock().blacklisted_until = None;
    }

    pub fn is_available(&self, now: Instant) -> bool {
        match self.state.lock().blacklisted_until {
            Some(until) => until <= now,
            None => true,
        }
    }

    pub fn record_error(&self, message: String) {
        self.state.lock().last_error = Some(message);
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    /// Snapshot of this member's health at `now`.
    pub fn status(&self, now: Instant) -> MemberStatus {
        let state = self.state.lock();
        let remaining = state
            .blacklisted_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|d| !d.is_zero());
        MemberStatus {
            name: self.name.clone(),
            weight: self.weight,
            available: remaining.is_none(),
            placeholder: self.is_placeholder(),
            blacklisted_for_ms: remaining.map(|d| d.as_millis() as u64),
            last_error: state.last_error.clone(),
        }
    }
}

/// Serializable view of one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberStatus {
    pub name: String,
    pub weight: u32,
    pub available: bool,
    pub placeholder: bool,
    pub blacklisted_for_ms: Option<u64>,
    pub last_error: Option<String>,
}
