//! Routing engine: the per-operation primary/replica decision.
//!
//! # Decision order (first match wins)
//! ```text
//! 1. force_primary scope active          → primary
//! 2. operation requires primary          → stick (if sticky), primary
//! 3. identity stuck to primary           → primary
//! 4. replica pool exhausted              → stick (if sticky), primary
//! 5. primary connection in a transaction → primary
//! 6. otherwise                           → replica
//! ```
//!
//! # Escalation
//! - Primary exhaustion: whitelist both pools, surface the error
//! - Replica exhaustion: record it on the primary pool's error log, decide again

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::config::Role;
use crate::context::StickyContext;
use crate::error::{BoxError, RouteError, RouteResult};
use crate::observability::metrics;
use crate::pool::{Connection, ConnectionHealth, Pool, PoolStatus};
use crate::routing::dispatch::{OperationKind, OperationSpec, OperationTable};
use crate::routing::scope::{self, Flag, FlagGuard, HijackGuard};

/// A replica exhaustion can send the decision to the primary once.
const MAX_ROUTING_ATTEMPTS: usize = 2;

/// Why a decision picked its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    ForcedPrimary,
    RequiresPrimary,
    Sticky,
    ReplicasExhausted,
    InTransaction,
    Default,
}

impl RouteReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteReason::ForcedPrimary => "forced_primary",
            RouteReason::RequiresPrimary => "requires_primary",
            RouteReason::Sticky => "sticky",
            RouteReason::ReplicasExhausted => "replicas_exhausted",
            RouteReason::InTransaction => "in_transaction",
            RouteReason::Default => "default",
        }
    }
}

/// Outcome of one routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    pub role: Role,
    pub reason: RouteReason,
}

/// Routes operations between one primary pool and one replica pool.
#[derive(Debug)]
pub struct RoutingEngine<C> {
    instance: Uuid,
    identity: String,
    sticky: bool,
    primary_ttl: Duration,
    primary: Pool<C>,
    replica: Pool<C>,
    context: StickyContext,
    operations: OperationTable,
}

impl<C: Connection> RoutingEngine<C> {
    pub fn new(
        identity: impl Into<String>,
        sticky: bool,
        primary_ttl: Duration,
        primary: Pool<C>,
        replica: Pool<C>,
        context: StickyContext,
        operations: OperationTable,
    ) -> Self {
        Self {
            instance: Uuid::new_v4(),
            identity: identity.into(),
            sticky,
            primary_ttl,
            primary,
            replica,
            context,
            operations,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn primary_pool(&self) -> &Pool<C> {
        &self.primary
    }

    pub fn replica_pool(&self) -> &Pool<C> {
        &self.replica
    }

    pub fn pool(&self, role: Role) -> &Pool<C> {
        match role {
            Role::Primary => &self.primary,
            Role::Replica => &self.replica,
        }
    }

    pub fn context(&self) -> &StickyContext {
        &self.context
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    // --- Stickiness ---

    /// Sticky in config and not inside a `without_sticking` scope.
    pub fn is_sticky(&self) -> bool {
        self.sticky && !scope::current(self.instance).skip_sticking
    }

    /// Pin this identity to the primary: for the TTL if `persist`, otherwise
    /// until the context is next released.
    pub fn stick_to_primary(&self, persist: bool) {
        if !self.is_sticky() {
            return;
        }
        let duration = if persist { self.primary_ttl } else { Duration::ZERO };
        self.context.stick(&self.identity, duration);
        metrics::record_stick();
        tracing::debug!(
            identity = %self.identity,
            ttl_ms = duration.as_millis() as u64,
            "Stuck to primary"
        );
    }

    pub fn is_stuck_to_primary(&self) -> bool {
        self.is_sticky() && self.context.is_stuck(&self.identity)
    }

    /// Drop any stick for this identity (unit-of-work boundary).
    pub fn release_primary(&self) {
        self.context.release(&self.identity);
    }

    fn in_transaction(&self) -> bool {
        self.primary.members().iter().any(|m| m.in_transaction())
    }

    // --- Decision ---

    /// Decide which pool serves `op`, applying stickiness side effects.
    pub fn decide(&self, op: &OperationSpec) -> RouteDecision {
        let decision = self.evaluate(op);
        metrics::record_route(decision.role, decision.reason.as_str());
        tracing::debug!(
            identity = %self.identity,
            role = %decision.role,
            reason = decision.reason.as_str(),
            "Routing decision"
        );
        decision
    }

    fn evaluate(&self, op: &OperationSpec) -> RouteDecision {
        let primary = |reason| RouteDecision {
            role: Role::Primary,
            reason,
        };

        if scope::current(self.instance).force_primary {
            return primary(RouteReason::ForcedPrimary);
        }
        if op.requires_primary {
            self.stick_to_primary(true);
            return primary(RouteReason::RequiresPrimary);
        }
        if self.is_stuck_to_primary() {
            return primary(RouteReason::Sticky);
        }
        if self.replica.is_exhausted() {
            self.stick_to_primary(true);
            return primary(RouteReason::ReplicasExhausted);
        }
        if self.in_transaction() {
            return primary(RouteReason::InTransaction);
        }
        RouteDecision {
            role: Role::Replica,
            reason: RouteReason::Default,
        }
    }

    /// The pool that should serve `op`.
    pub fn route(&self, op: &OperationSpec) -> &Pool<C> {
        self.pool(self.decide(op).role)
    }

    // --- Execution ---

    /// Route `op` and run it, with replica → primary fallback.
    ///
    /// Called from inside a running operation, `op` runs on the held
    /// connection instead.
    pub fn execute<T, F>(&self, spec: &OperationSpec, mut op: F) -> RouteResult<T>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        if let Some(member) = self.held_member()? {
            return member.run(op).map_err(RouteError::Query);
        }

        // Held across the fallback decision so step 4 sees the replicas as
        // exhausted even when their blacklist window is already over.
        let mut _replica_disabled = None;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let decision = self.decide(spec);
            let err = match self.run_on(self.pool(decision.role), &mut op) {
                Err(err) if err.is_exhaustion() => err,
                other => return other,
            };

            match decision.role {
                Role::Primary => {
                    tracing::error!(
                        identity = %self.identity,
                        error = %err,
                        "Primary pool exhausted, whitelisting every connection"
                    );
                    self.whitelist_all();
                    metrics::record_whitelist_reset();
                    return Err(err);
                }
                Role::Replica => {
                    // Recorded on the primary pool's log, not the replica's.
                    self.primary.record_error(err.to_string());
                    if attempt >= MAX_ROUTING_ATTEMPTS {
                        return Err(err);
                    }
                    tracing::warn!(
                        identity = %self.identity,
                        error = %err,
                        "Replica pool exhausted, falling back"
                    );
                    metrics::record_fallback();
                    _replica_disabled = Some(self.replica.disable());
                }
            }
        }
    }

    /// The connection currently executing on this thread, if hijacked.
    fn held_member(&self) -> RouteResult<Option<&ConnectionHealth<C>>> {
        let state = scope::current(self.instance);
        if !state.hijacked {
            return Ok(None);
        }
        let (role, index) = state.held.ok_or_else(|| {
            RouteError::ContractViolation("hijacked with no held connection".to_string())
        })?;
        self.pool(role).member(index).map(Some).ok_or_else(|| {
            RouteError::ContractViolation(format!(
                "held connection {} missing from {} pool",
                index, role
            ))
        })
    }

    /// Run `op` on a member of `pool`, with this thread hijacked to it.
    fn run_on<T, F>(&self, pool: &Pool<C>, op: &mut F) -> RouteResult<T>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        let role = pool.role();
        pool.provide_member(|index, member| {
            let _hijack = HijackGuard::enter(self.instance, role, index);
            member.run(&mut *op)
        })
    }

    /// Run `op` on any working connection, primary first, without stickiness.
    pub fn any_connection<T, F>(&self, mut op: F) -> RouteResult<T>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        if !self.primary.is_disabled() {
            match self.run_on(&self.primary, &mut op) {
                Err(err) if err.is_exhaustion() => {
                    tracing::debug!(error = %err, "Primary unavailable, trying replicas");
                }
                other => return other,
            }
        }
        let _disabled = self.primary.disable();
        self.run_on(&self.replica, &mut op)
    }

    /// Run `op` on every connection, replicas before the primary.
    ///
    /// An empty replica pool is disabled for a second pass so the operation
    /// still reaches the primary; an empty primary pool is not an error once
    /// the replicas have been handled.
    pub fn send_to_all<T, F>(&self, mut op: F) -> RouteResult<Vec<T>>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        match self.broadcast(&mut op) {
            Err(RouteError::NoConnectionsAvailable { role: Role::Replica }) => {
                let _disabled = self.replica.disable();
                self.broadcast(&mut op)
            }
            other => other,
        }
    }

    fn broadcast<T, F>(&self, op: &mut F) -> RouteResult<Vec<T>>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        let mut results = self.broadcast_on(&self.replica, op)?;
        match self.broadcast_on(&self.primary, op) {
            Ok(values) => results.extend(values),
            Err(RouteError::NoConnectionsAvailable { role: Role::Primary }) => {
                tracing::debug!(
                    identity = %self.identity,
                    "No primary configured, broadcast reached replicas only"
                );
            }
            Err(err) => return Err(err),
        }
        Ok(results)
    }

    fn broadcast_on<T, F>(&self, pool: &Pool<C>, op: &mut F) -> RouteResult<Vec<T>>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        let role = pool.role();
        pool.send_to_all_members(|index, member| {
            let _hijack = HijackGuard::enter(self.instance, role, index);
            member.run(&mut *op)
        })
    }

    /// Dispatch a named operation through the capability table.
    ///
    /// - Inside a running operation (hijacked), every call goes straight to
    ///   the held connection and is never re-routed.
    /// - Routed names go through [`RoutingEngine::execute`].
    /// - Broadcast names go through [`RoutingEngine::send_to_all`] and yield
    ///   the last connection's value.
    /// - Unknown names go to [`RoutingEngine::any_connection`].
    pub fn dispatch<T, F>(&self, name: &str, op: F) -> RouteResult<T>
    where
        F: FnMut(&C) -> Result<T, BoxError>,
    {
        if let Some(member) = self.held_member()? {
            tracing::trace!(
                operation = name,
                connection = %member.name(),
                "Reentrant call, not re-routed"
            );
            return member.run(op).map_err(RouteError::Query);
        }

        match self.operations.get(name) {
            Some(spec) if spec.kind == OperationKind::Broadcast => self
                .send_to_all(op)?
                .pop()
                .ok_or(RouteError::NoConnectionsAvailable { role: Role::Primary }),
            Some(spec) => self.execute(&spec, op),
            None => {
                tracing::trace!(operation = name, "Unrecognized operation, passing through");
                self.any_connection(op)
            }
        }
    }

    // --- Scopes ---

    /// Route everything in `f` to the primary.
    pub fn with_force_primary<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = FlagGuard::set(self.instance, Flag::ForcePrimary);
        f()
    }

    /// Run `f` without creating or honouring stickiness.
    pub fn without_sticking<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = FlagGuard::set(self.instance, Flag::SkipSticking);
        f()
    }

    /// True while an operation dispatched by this engine runs on this thread.
    pub fn is_hijacked(&self) -> bool {
        scope::current(self.instance).hijacked
    }

    // --- Health ---

    /// Clear every blacklist entry in both pools.
    pub fn whitelist_all(&self) {
        self.primary.whitelist_all();
        self.replica.whitelist_all();
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            identity: self.identity.clone(),
            sticky: self.sticky,
            stuck_to_primary: self.is_stuck_to_primary(),
            stuck_for_ms: self.context.remaining(&self.identity).map(|d| d.as_millis() as u64),
            primary: self.primary.status(),
            replica: self.replica.status(),
        }
    }
}

/// Serializable view of an engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub identity: String,
    pub sticky: bool,
    pub stuck_to_primary: bool,
    pub stuck_for_ms: Option<u64>,
    pub primary: PoolStatus,
    pub replica: PoolStatus,
}
