//! Engine construction from configuration.
//!
//! # Responsibilities
//! - Establish every configured connection through a [`Connector`]
//! - Install placeholders for connections that fail to come up
//! - Resolve selection strategies by name
//! - Wire the shared classifier, clock and stickiness context

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConnectionConfig, Role, RouterConfig};
use crate::context::StickyContext;
use crate::error::{BoxError, RouteResult};
use crate::pool::{Connection, ConnectionHealth, Pool, StrategyRegistry};
use crate::resilience::ErrorClassifier;
use crate::routing::dispatch::OperationTable;
use crate::routing::engine::RoutingEngine;

/// Opens physical connections. Supplied by the adapter.
pub trait Connector<C> {
    fn connect(&self, config: &ConnectionConfig) -> Result<C, BoxError>;
}

impl<C, F> Connector<C> for F
where
    F: Fn(&ConnectionConfig) -> Result<C, BoxError>,
{
    fn connect(&self, config: &ConnectionConfig) -> Result<C, BoxError> {
        self(config)
    }
}

/// Builds a [`RoutingEngine`] from a [`RouterConfig`].
#[derive(Debug)]
pub struct EngineBuilder {
    config: RouterConfig,
    clock: Option<Arc<dyn Clock>>,
    context: Option<StickyContext>,
    classifier: Option<ErrorClassifier>,
    strategies: StrategyRegistry,
    operations: OperationTable,
}

impl EngineBuilder {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            clock: None,
            context: None,
            classifier: None,
            strategies: StrategyRegistry::new(),
            operations: OperationTable::standard(),
        }
    }

    /// Use `clock` for blacklist windows (and for stickiness, unless a
    /// context is supplied).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share stickiness with other engines through `context`.
    pub fn context(mut self, context: StickyContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Replace the classifier built from `connection_error_matchers`.
    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn operations(mut self, operations: OperationTable) -> Self {
        self.operations = operations;
        self
    }

    /// Connect every configured connection and assemble the engine.
    ///
    /// Connection failures never fail the build; only an unknown strategy does.
    pub fn connect<C, K>(self, connector: &K) -> RouteResult<RoutingEngine<C>>
    where
        C: Connection,
        K: Connector<C> + ?Sized,
    {
        let context = match (&self.context, &self.clock) {
            (Some(context), _) => context.clone(),
            (None, Some(clock)) => StickyContext::new(clock.clone()),
            (None, None) => StickyContext::shared(),
        };
        let clock: Arc<dyn Clock> = self.clock.clone().unwrap_or_else(|| Arc::new(SystemClock));
        let classifier = Arc::new(self.classifier.clone().unwrap_or_else(|| {
            ErrorClassifier::from_config(&self.config.connection_error_matchers)
        }));

        let primary = self.build_pool(Role::Primary, connector, &classifier, &clock)?;
        let replica = self.build_pool(Role::Replica, connector, &classifier, &clock)?;

        tracing::info!(
            identity = %self.config.name,
            primaries = primary.len(),
            replicas = replica.len(),
            sticky = self.config.sticky,
            primary_ttl_ms = self.config.primary_ttl_ms,
            "Routing engine initialized"
        );

        Ok(RoutingEngine::new(
            self.config.name.clone(),
            self.config.sticky,
            self.config.primary_ttl(),
            primary,
            replica,
            context,
            self.operations,
        ))
    }

    fn build_pool<C, K>(
        &self,
        role: Role,
        connector: &K,
        classifier: &Arc<ErrorClassifier>,
        clock: &Arc<dyn Clock>,
    ) -> RouteResult<Pool<C>>
    where
        C: Connection,
        K: Connector<C> + ?Sized,
    {
        let members: Vec<_> = self
            .config
            .connections_for(role)
            .map(|config| match connector.connect(config) {
                Ok(conn) => ConnectionHealth::new(config, conn),
                Err(error) => ConnectionHealth::wrap_connect_failure(config, error),
            })
            .collect();

        let weights: Vec<u32> = members.iter().map(|m| m.weight()).collect();
        let strategy_name = match role {
            Role::Primary => &self.config.primary_strategy,
            Role::Replica => &self.config.replica_strategy,
        };
        let strategy = self.strategies.build(strategy_name, &weights)?;

        Ok(Pool::new(
            role,
            members,
            strategy,
            self.config.blacklist_duration(),
            classifier.clone(),
            clock.clone(),
        ))
    }
}
