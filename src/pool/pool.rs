//! Connection pool for one role.
//!
//! # Responsibilities
//! - Own the members of one role in declared order
//! - Apply the selection strategy over currently available members
//! - Blacklist members that fail at the connection level and retry
//! - Broadcast operations to every member
//!
//! # Design Decisions
//! - `disabled` is per thread: a fallback attempt on one thread never hides
//!   the pool from routing on another
//! - The error log keeps at most `len() + 1` entries and is cleared by
//!   a successful `provide` or a full whitelist

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::Role;
use crate::error::{BoxError, RouteError, RouteResult};
use crate::observability::metrics;
use crate::pool::connection::{Connection, ConnectionHealth, MemberStatus};
use crate::pool::strategy::SelectionStrategy;
use crate::resilience::{ErrorClassifier, Verdict};
use crate::routing::scope::{self, Flag, FlagGuard};

/// Members of one role plus the policy used to pick among them.
#[derive(Debug)]
pub struct Pool<C> {
    id: Uuid,
    role: Role,
    members: Vec<ConnectionHealth<C>>,
    strategy: Box<dyn SelectionStrategy>,
    /// Newest first; cleared after a successful `provide`.
    errors: Mutex<Vec<String>>,
    blacklist_duration: Duration,
    classifier: Arc<ErrorClassifier>,
    clock: Arc<dyn Clock>,
}

impl<C: Connection> Pool<C> {
    pub fn new(
        role: Role,
        members: Vec<ConnectionHealth<C>>,
        strategy: Box<dyn SelectionStrategy>,
        blacklist_duration: Duration,
        classifier: Arc<ErrorClassifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            members,
            strategy,
            errors: Mutex::new(Vec::new()),
            blacklist_duration,
            classifier,
            clock,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn members(&self) -> &[ConnectionHealth<C>] {
        &self.members
    }

    pub fn member(&self, index: usize) -> Option<&ConnectionHealth<C>> {
        self.members.get(index)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True while a [`Pool::disable`] guard is alive on this thread.
    pub fn is_disabled(&self) -> bool {
        scope::current(self.id).disabled
    }

    /// Disable the pool on the current thread until the guard is dropped.
    pub fn disable(&self) -> FlagGuard {
        FlagGuard::set(self.id, Flag::Disabled)
    }

    /// True iff the pool has at least one member and none is available.
    pub fn completely_blacklisted(&self) -> bool {
        let now = self.clock.now();
        !self.members.is_empty() && self.members.iter().all(|m| !m.is_available(now))
    }

    /// True when `provide` would find no candidate: disabled, empty, or all blacklisted.
    pub fn is_exhausted(&self) -> bool {
        if self.is_disabled() {
            return true;
        }
        let now = self.clock.now();
        !self.members.iter().any(|m| m.is_available(now))
    }

    /// Clear every member's blacklist entry and the error log.
    pub fn whitelist_all(&self) {
        for member in &self.members {
            member.whitelist();
        }
        self.errors.lock().clear();
    }

    /// Add to the error log (newest first), dropping the oldest entries
    /// beyond one per member plus one.
    pub fn record_error(&self, message: impl Into<String>) {
        let mut errors = self.errors.lock();
        errors.insert(0, message.into());
        errors.truncate(self.members.len() + 1);
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    fn availability(&self) -> Vec<bool> {
        if self.is_disabled() {
            return vec![false; self.members.len()];
        }
        let now = self.clock.now();
        self.members.iter().map(|m| m.is_available(now)).collect()
    }

    fn exhausted_error(&self) -> RouteError {
        if self.members.is_empty() {
            RouteError::NoConnectionsAvailable { role: self.role }
        } else {
            RouteError::AllConnectionsBlacklisted {
                role: self.role,
                errors: self.errors(),
            }
        }
    }

    /// Pick the next available candidate without running anything.
    pub fn next_candidate(&self) -> RouteResult<usize> {
        let available = self.availability();
        match self.strategy.next_candidate(&available) {
            Some(index) if index < self.members.len() => Ok(index),
            Some(index) => Err(RouteError::ContractViolation(format!(
                "[{}] selection strategy returned index {} for a pool of {}",
                self.role,
                index,
                self.members.len()
            ))),
            None => Err(self.exhausted_error()),
        }
    }

    /// Run `op` against a working connection from this pool.
    pub fn provide<T, F>(&self, mut op: F) -> RouteResult<T>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        self.provide_member(|_, member| member.run(&mut op))
    }

    /// Like [`Pool::provide`], but `op` receives the member and its index.
    ///
    /// At most one attempt per member: every failed candidate is blacklisted
    /// before the next selection, so the loop cannot revisit it.
    pub fn provide_member<T, F>(&self, mut op: F) -> RouteResult<T>
    where
        F: FnMut(usize, &ConnectionHealth<C>) -> Result<T, BoxError>,
    {
        for _ in 0..=self.members.len() {
            let index = self.next_candidate()?;
            let member = &self.members[index];

            tracing::trace!(role = %self.role, connection = %member.name(), "Candidate selected");

            let error = match op(index, member) {
                Ok(value) => {
                    self.errors.lock().clear();
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.classifier.classify(error) {
                Verdict::PassThrough(error) => return Err(RouteError::Query(error)),
                Verdict::ConnectionFailure(error) => {
                    let in_transaction = self.role == Role::Primary && member.in_transaction();
                    self.blacklist_member(member, &error);
                    if in_transaction {
                        return Err(RouteError::Connection {
                            connection: member.name().to_string(),
                            source: error,
                        });
                    }
                }
            }
        }
        Err(self.exhausted_error())
    }

    fn blacklist_member(&self, member: &ConnectionHealth<C>, error: &BoxError) {
        let message = format!("{}: {}", member.name(), error);
        tracing::warn!(
            role = %self.role,
            connection = %member.name(),
            error = %error,
            duration_ms = self.blacklist_duration.as_millis() as u64,
            "Blacklisting connection"
        );
        member.blacklist(self.clock.now(), self.blacklist_duration);
        member.record_error(message.clone());
        self.record_error(message);
        metrics::record_blacklist(self.role, member.name());
    }

    /// Invoke `op` on every member regardless of health.
    ///
    /// Failures are collected, not retried. If every member fails, the first
    /// failure is returned. A disabled pool is skipped.
    pub fn send_to_all<T, F>(&self, mut op: F) -> RouteResult<Vec<T>>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        self.send_to_all_members(|_, member| member.run(&mut op))
    }

    /// Like [`Pool::send_to_all`], but `op` receives the member and its index.
    pub fn send_to_all_members<T, F>(&self, mut op: F) -> RouteResult<Vec<T>>
    where
        F: FnMut(usize, &ConnectionHealth<C>) -> Result<T, BoxError>,
    {
        if self.is_disabled() {
            return Ok(Vec::new());
        }
        if self.members.is_empty() {
            return Err(RouteError::NoConnectionsAvailable { role: self.role });
        }

        let mut results = Vec::with_capacity(self.members.len());
        let mut failures = Vec::new();
        for (index, member) in self.members.iter().enumerate() {
            match op(index, member) {
                Ok(value) => results.push(value),
                Err(error) => {
                    tracing::debug!(
                        role = %self.role,
                        connection = %member.name(),
                        error = %error,
                        "Broadcast failed on connection"
                    );
                    failures.push((member.name().to_string(), error));
                }
            }
        }

        if results.is_empty() {
            let (connection, error) = failures.remove(0);
            return Err(match self.classifier.classify(error) {
                Verdict::PassThrough(error) => RouteError::Query(error),
                Verdict::ConnectionFailure(source) => RouteError::Connection { connection, source },
            });
        }
        Ok(results)
    }

    /// Serializable view of the pool at the current instant.
    pub fn status(&self) -> PoolStatus {
        let now = self.clock.now();
        PoolStatus {
            role: self.role,
            disabled: self.is_disabled(),
            members: self.members.iter().map(|m| m.status(now)).collect(),
            errors: self.errors(),
        }
    }
}

/// Serializable view of a pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub role: Role,
    pub disabled: bool,
    pub members: Vec<MemberStatus>,
    pub errors: Vec<String>,
}
