//! Routing decision and failover behaviour over mock connections.

mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use common::{config, Harness};
use replica_router::clock::ManualClock;
use replica_router::pool::{SelectionStrategy, StrategyRegistry};
use replica_router::{OperationSpec, Role, RouteError, RouteReason, StickyContext};

fn reads(h: &Harness, n: usize) -> Vec<String> {
    (0..n).map(|_| h.read().unwrap()).collect()
}

#[test]
fn test_writes_always_reach_primary() {
    let h = Harness::new(config(&["p1"], &["r1", "r2"]));
    h.conn("r1").set_down(true);
    h.conn("r2").set_down(true);

    assert_eq!(h.engine.route(&OperationSpec::write()).role(), Role::Primary);
    assert_eq!(h.write().unwrap(), "p1");
    assert_eq!(h.calls(), vec!["p1"]);
}

#[test]
fn test_write_sticks_reads_to_primary_for_ttl() {
    let h = Harness::new(config(&["p1"], &["r1", "r2"]));

    assert_eq!(h.write().unwrap(), "p1");
    h.clock.advance(Duration::from_millis(4_999));
    assert_eq!(h.read().unwrap(), "p1");
    assert_eq!(h.engine.decide(&OperationSpec::read()).reason, RouteReason::Sticky);

    h.clock.advance(Duration::from_millis(1));
    assert_eq!(h.read().unwrap(), "r1");
}

#[test]
fn test_sticky_disabled_reads_go_to_replica() {
    let mut cfg = config(&["p1"], &["r1"]);
    cfg.sticky = false;
    let h = Harness::new(cfg);

    h.write().unwrap();
    assert_eq!(h.read().unwrap(), "r1");
    assert!(!h.engine.is_stuck_to_primary());
}

#[test]
fn test_round_robin_rotation() {
    let h = Harness::new(config(&["p1"], &["r1", "r2", "r3"]));
    assert_eq!(reads(&h, 6), vec!["r1", "r2", "r3", "r1", "r2", "r3"]);
}

#[test]
fn test_failed_replica_is_skipped_until_window_elapses() {
    let h = Harness::new(config(&["p1"], &["r1", "r2", "r3"]));
    h.conn("r1").set_down(true);

    assert_eq!(h.read().unwrap(), "r2");
    assert_eq!(h.take_calls(), vec!["r1", "r2"]);

    h.conn("r1").set_down(false);
    assert_eq!(reads(&h, 3), vec!["r3", "r2", "r3"]);

    h.clock.advance(Duration::from_secs(30));
    assert_eq!(reads(&h, 3), vec!["r1", "r2", "r3"]);
}

#[test]
fn test_replica_exhaustion_falls_back_and_sticks() {
    let h = Harness::new(config(&["p1"], &["r1", "r2"]));
    h.conn("r1").set_down(true);
    h.conn("r2").set_down(true);

    assert_eq!(h.read().unwrap(), "p1");
    assert_eq!(h.calls(), vec!["r1", "r2", "p1"]);
    assert!(h.engine.replica_pool().completely_blacklisted());
    assert!(h.engine.is_stuck_to_primary());
    assert_eq!(h.engine.context().remaining("app"), Some(Duration::from_secs(5)));

    h.take_calls();
    assert_eq!(h.read().unwrap(), "p1");
    assert_eq!(h.calls(), vec!["p1"]);
}

#[test]
fn test_blacklisted_replicas_route_straight_to_primary() {
    let h = Harness::new(config(&["p1"], &["r1"]));
    h.conn("r1").set_down(true);
    h.read().unwrap();
    h.engine.release_primary();

    let decision = h.engine.decide(&OperationSpec::read());
    assert_eq!(decision.role, Role::Primary);
    assert_eq!(decision.reason, RouteReason::ReplicasExhausted);
}

#[test]
fn test_replica_exhaustion_is_logged_on_primary_pool() {
    let h = Harness::new(config(&["p1"], &["r1"]));
    h.conn("r1").set_down(true);
    h.conn("p1").set_down(true);

    let err = h.read().unwrap_err();
    match &err {
        RouteError::AllConnectionsBlacklisted { role, errors } => {
            assert_eq!(*role, Role::Primary);
            assert_eq!(errors.len(), 2);
            assert_eq!(errors[0], "p1: could not connect to server: p1");
            assert_eq!(
                errors[1],
                "[replica] all connections are blacklisted -> r1: could not connect to server: r1"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.calls(), vec!["r1", "p1"]);
    // The full reset after primary exhaustion also empties both logs.
    assert!(h.engine.primary_pool().errors().is_empty());
    assert!(h.engine.replica_pool().errors().is_empty());
}

#[test]
fn test_replica_exhaustion_entry_cleared_once_primary_serves() {
    let h = Harness::new(config(&["p1"], &["r1"]));
    h.conn("r1").set_down(true);

    assert_eq!(h.read().unwrap(), "p1");
    assert!(h.engine.primary_pool().errors().is_empty());
}

#[test]
fn test_fallback_reaches_primary_without_blacklist_window() {
    let mut cfg = config(&["p1"], &["r1"]);
    cfg.blacklist_duration_ms = 0;
    let h = Harness::new(cfg);
    h.conn("r1").set_down(true);

    assert_eq!(h.read().unwrap(), "p1");
    assert_eq!(h.take_calls(), vec!["r1", "r1", "p1"]);
    assert!(!h.engine.replica_pool().is_disabled());
    assert!(h.engine.is_stuck_to_primary());
}

#[test]
fn test_long_primary_outage_keeps_error_log_small() {
    let h = Harness::new(config(&["p1"], &["r1"]));
    h.conn("p1").set_down(true);

    for _ in 0..500 {
        match h.write().unwrap_err() {
            RouteError::AllConnectionsBlacklisted { errors, .. } => {
                assert_eq!(errors, vec!["p1: could not connect to server: p1"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(h.engine.primary_pool().errors().is_empty());
}

#[test]
fn test_primary_exhaustion_whitelists_both_pools() {
    let h = Harness::new(config(&["p1"], &["r1", "r2"]));
    h.conn("r1").set_down(true);
    assert_eq!(h.read().unwrap(), "r2");

    h.conn("p1").set_down(true);
    let err = h.write().unwrap_err();
    assert_eq!(err.role(), Some(Role::Primary));

    let status = h.engine.status();
    assert!(status.primary.members.iter().all(|m| m.available));
    assert!(status.replica.members.iter().all(|m| m.available));
}

#[test]
fn test_no_primary_configured() {
    let h = Harness::new(config(&[], &["r1"]));
    let err = h.write().unwrap_err();
    assert!(matches!(err, RouteError::NoConnectionsAvailable { role: Role::Primary }));
    assert_eq!(err.to_string(), "[primary] no connections available");
}

#[test]
fn test_force_primary_scope() {
    let h = Harness::new(config(&["p1"], &["r1"]));

    let inside = h.engine.with_force_primary(|| (h.read().unwrap(), h.write().unwrap()));
    assert_eq!(inside, ("p1".to_string(), "p1".to_string()));
    assert_eq!(h.read().unwrap(), "r1");
}

#[test]
fn test_force_primary_reverts_after_error_and_panic() {
    let h = Harness::new(config(&["p1"], &["r1"]));
    h.conn("p1").set_down(true);

    assert!(h.engine.with_force_primary(|| h.read()).is_err());
    assert_eq!(h.read().unwrap(), "r1");

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        h.engine.with_force_primary(|| panic!("aborted unit of work"))
    }));
    assert!(result.is_err());
    assert_eq!(h.engine.decide(&OperationSpec::read()).role, Role::Replica);
}

#[test]
fn test_without_sticking() {
    let h = Harness::new(config(&["p1"], &["r1"]));

    h.engine.without_sticking(|| h.write()).unwrap();
    assert!(!h.engine.is_stuck_to_primary());
    assert_eq!(h.read().unwrap(), "r1");

    h.write().unwrap();
    assert_eq!(h.engine.without_sticking(|| h.read()).unwrap(), "r1");
    assert_eq!(h.read().unwrap(), "p1");
}

#[test]
fn test_open_transaction_pins_reads_without_sticking() {
    let h = Harness::new(config(&["p1"], &["r1"]));
    h.conn("p1").set_in_transaction(true);
    assert_eq!(h.read().unwrap(), "p1");

    h.conn("p1").set_in_transaction(false);
    assert_eq!(h.read().unwrap(), "r1");
}

#[test]
fn test_unreachable_connection_becomes_placeholder() {
    let h = Harness::build(config(&["p1"], &["r1", "r2"]), &["r1"], |b| b);

    assert_eq!(h.read().unwrap(), "r2");
    // The placeholder fails before any call reaches a connection.
    assert_eq!(h.calls(), vec!["r2"]);

    let status = h.engine.status();
    let r1 = &status.replica.members[0];
    assert!(r1.placeholder);
    assert!(!r1.available);
    assert!(r1.last_error.as_deref().unwrap().contains("could not connect to 'r1'"));
}

#[test]
fn test_end_to_end_session() {
    let h = Harness::new(config(&["p1"], &["r1", "r2"]));

    assert_eq!(h.write().unwrap(), "p1");

    h.clock.advance(Duration::from_secs(1));
    assert_eq!(h.read().unwrap(), "p1");

    h.clock.advance(Duration::from_secs(5));
    h.conn("r1").set_down(true);
    h.take_calls();
    assert_eq!(h.read().unwrap(), "r2");
    assert_eq!(h.take_calls(), vec!["r1", "r2"]);

    h.conn("r1").set_down(false);
    assert_eq!(h.read().unwrap(), "r2");
    assert_eq!(h.take_calls(), vec!["r2"]);

    h.clock.advance(Duration::from_millis(29_999));
    assert_eq!(h.read().unwrap(), "r2");

    h.clock.advance(Duration::from_millis(1));
    assert_eq!(h.read().unwrap(), "r1");
}

#[test]
fn test_weighted_round_robin() {
    let mut cfg = config(&["p1"], &[]);
    cfg.connections.push(replica_router::ConnectionConfig::replica("r1").with_weight(2));
    cfg.connections.push(replica_router::ConnectionConfig::replica("r2"));
    let h = Harness::new(cfg);

    assert_eq!(reads(&h, 6), vec!["r1", "r1", "r2", "r1", "r1", "r2"]);
}

#[test]
fn test_priority_failover_strategy() {
    let mut cfg = config(&["p1"], &["r1", "r2"]);
    cfg.replica_strategy = "failover".to_string();
    let h = Harness::new(cfg);

    assert_eq!(reads(&h, 2), vec!["r1", "r1"]);
    h.conn("r1").set_down(true);
    assert_eq!(reads(&h, 2), vec!["r2", "r2"]);
}

#[derive(Debug)]
struct LastAvailable;

impl SelectionStrategy for LastAvailable {
    fn next_candidate(&self, available: &[bool]) -> Option<usize> {
        available.iter().rposition(|a| *a)
    }
}

#[test]
fn test_custom_strategy() {
    let mut cfg = config(&["p1"], &["r1", "r2", "r3"]);
    cfg.replica_strategy = "last_available".to_string();
    let mut registry = StrategyRegistry::new();
    registry.register("last_available", |_: &[u32]| -> Box<dyn SelectionStrategy> {
        Box::new(LastAvailable)
    });
    let h = Harness::build(cfg, &[], |b| b.strategies(registry));

    assert_eq!(h.read().unwrap(), "r3");
    h.conn("r3").set_down(true);
    assert_eq!(h.read().unwrap(), "r2");
}

#[derive(Debug)]
struct OutOfRange;

impl SelectionStrategy for OutOfRange {
    fn next_candidate(&self, available: &[bool]) -> Option<usize> {
        Some(available.len())
    }
}

#[test]
fn test_strategy_out_of_range_is_contract_violation() {
    let mut cfg = config(&["p1"], &["r1"]);
    cfg.replica_strategy = "broken".to_string();
    let mut registry = StrategyRegistry::new();
    registry.register("broken", |_: &[u32]| -> Box<dyn SelectionStrategy> { Box::new(OutOfRange) });
    let h = Harness::build(cfg, &[], |b| b.strategies(registry));

    assert!(matches!(h.read().unwrap_err(), RouteError::ContractViolation(_)));
}

#[test]
fn test_engines_share_stickiness_through_context() {
    let context = StickyContext::new(Arc::new(ManualClock::new()));
    let writer = Harness::build(config(&["p1"], &["r1"]), &[], |b| b.context(context.clone()));
    let reader = Harness::build(config(&["p1"], &["r1"]), &[], |b| b.context(context.clone()));

    assert_eq!(reader.read().unwrap(), "r1");
    writer.write().unwrap();
    assert_eq!(reader.read().unwrap(), "p1");

    context.reset();
    assert_eq!(reader.read().unwrap(), "r1");
}
