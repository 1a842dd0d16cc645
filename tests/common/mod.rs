//! Shared utilities for routing integration and load tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use replica_router::clock::ManualClock;
use replica_router::config::{ConnectionConfig, RouterConfig};
use replica_router::{BoxError, Connection, EngineBuilder, RouteResult, RoutingEngine};

/// Programmable behaviour of one mock connection, shared with the test.
#[derive(Debug, Default)]
pub struct MockState {
    pub down: AtomicBool,
    pub in_transaction: AtomicBool,
}

impl MockState {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn set_in_transaction(&self, open: bool) {
        self.in_transaction.store(open, Ordering::SeqCst);
    }
}

/// Connection handed to the engine. Every call is appended to the shared log.
#[derive(Debug)]
pub struct MockConn {
    pub name: String,
    state: Arc<MockState>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockConn {
    /// Answers with the connection name, or a connection-level failure when down.
    pub fn query(&self) -> Result<String, BoxError> {
        self.log.lock().push(self.name.clone());
        if self.state.down.load(Ordering::SeqCst) {
            Err(format!("could not connect to server: {}", self.name).into())
        } else {
            Ok(self.name.clone())
        }
    }
}

impl Connection for MockConn {
    fn in_transaction(&self) -> bool {
        self.state.in_transaction.load(Ordering::SeqCst)
    }
}

pub fn config(primaries: &[&str], replicas: &[&str]) -> RouterConfig {
    let mut config = RouterConfig::default();
    config.name = "app".to_string();
    config.primary_ttl_ms = 5_000;
    config.blacklist_duration_ms = 30_000;
    config.connections = primaries
        .iter()
        .map(|n| ConnectionConfig::primary(*n))
        .chain(replicas.iter().map(|n| ConnectionConfig::replica(*n)))
        .collect();
    config
}

/// A routing engine over mock connections on a manual clock.
pub struct Harness {
    pub engine: RoutingEngine<MockConn>,
    pub clock: Arc<ManualClock>,
    states: HashMap<String, Arc<MockState>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new(config: RouterConfig) -> Self {
        Self::build(config, &[], |b| b)
    }

    /// Connections named in `unreachable` fail to connect at build time.
    pub fn build(
        config: RouterConfig,
        unreachable: &[&str],
        customize: impl FnOnce(EngineBuilder) -> EngineBuilder,
    ) -> Self {
        let clock = Arc::new(ManualClock::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let states: HashMap<String, Arc<MockState>> = config
            .connections
            .iter()
            .map(|c| (c.name.clone(), Arc::new(MockState::default())))
            .collect();

        let connector = |c: &ConnectionConfig| -> Result<MockConn, BoxError> {
            if unreachable.contains(&c.name.as_str()) {
                return Err(format!("could not connect to server: {}", c.name).into());
            }
            Ok(MockConn {
                name: c.name.clone(),
                state: states[&c.name].clone(),
                log: log.clone(),
            })
        };

        let builder = customize(EngineBuilder::new(config).clock(clock.clone()));
        let engine = builder.connect(&connector).expect("engine builds");

        Self {
            engine,
            clock,
            states,
            log,
        }
    }

    pub fn conn(&self, name: &str) -> &MockState {
        &self.states[name]
    }

    pub fn read(&self) -> RouteResult<String> {
        self.engine.dispatch("select", |c: &MockConn| c.query())
    }

    pub fn write(&self) -> RouteResult<String> {
        self.engine.dispatch("insert", |c: &MockConn| c.query())
    }

    /// Connection names in call order, including failed attempts.
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock())
    }
}
