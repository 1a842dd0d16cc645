//! Metrics collection.
//!
//! # Metrics
//! - `replica_router_routes_total` (counter): routing decisions by role, reason
//! - `replica_router_blacklisted_total` (counter): blacklist events by role, connection
//! - `replica_router_fallbacks_total` (counter): replica exhaustion → primary retries
//! - `replica_router_whitelist_resets_total` (counter): full resets after primary exhaustion
//! - `replica_router_sticks_total` (counter): stick-to-primary marks

use crate::config::Role;

pub fn record_route(role: Role, reason: &'static str) {
    metrics::counter!("replica_router_routes_total", "role" => role.as_str(), "reason" => reason)
        .increment(1);
}

pub fn record_blacklist(role: Role, connection: &str) {
    metrics::counter!(
        "replica_router_blacklisted_total",
        "role" => role.as_str(),
        "connection" => connection.to_string()
    )
    .increment(1);
}

pub fn record_fallback() {
    metrics::counter!("replica_router_fallbacks_total").increment(1);
}

pub fn record_whitelist_reset() {
    metrics::counter!("replica_router_whitelist_resets_total").increment(1);
}

pub fn record_stick() {
    metrics::counter!("replica_router_sticks_total").increment(1);
}
