//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a routing engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Identity of the engine, used as the stickiness key.
    pub name: String,

    /// Pin to the primary after a write (read-your-writes).
    pub sticky: bool,

    /// How long a persisted stick lasts, in milliseconds.
    pub primary_ttl_ms: u64,

    /// How long a failed connection is excluded from selection, in milliseconds.
    pub blacklist_duration_ms: u64,

    /// Selection strategy for the primary pool.
    pub primary_strategy: String,

    /// Selection strategy for the replica pool.
    pub replica_strategy: String,

    /// Extra substrings (case-insensitive) that mark an error as connection-level.
    pub connection_error_matchers: Vec<String>,

    /// Physical connection definitions.
    pub connections: Vec<ConnectionConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            sticky: true,
            primary_ttl_ms: 5_000,
            blacklist_duration_ms: 30_000,
            primary_strategy: "round_robin".to_string(),
            replica_strategy: "round_robin".to_string(),
            connection_error_matchers: Vec::new(),
            connections: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl RouterConfig {
    pub fn primary_ttl(&self) -> Duration {
        Duration::from_millis(self.primary_ttl_ms)
    }

    pub fn blacklist_duration(&self) -> Duration {
        Duration::from_millis(self.blacklist_duration_ms)
    }

    /// Connections with the given role, in declared order.
    pub fn connections_for(&self, role: Role) -> impl Iterator<Item = &ConnectionConfig> {
        self.connections.iter().filter(move |c| c.role == role)
    }
}

/// Which pool a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The read/write target.
    Primary,
    /// A read-only target.
    Replica,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Replica => "replica",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single physical connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    /// Unique connection identifier.
    pub name: String,

    /// Pool membership.
    pub role: Role,

    /// Adapter-specific connection string.
    #[serde(default)]
    pub url: String,

    /// Relative share of round-robin selections (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl ConnectionConfig {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            url: String::new(),
            weight: default_weight(),
        }
    }

    pub fn primary(name: impl Into<String>) -> Self {
        Self::new(name, Role::Primary)
    }

    pub fn replica(name: impl Into<String>) -> Self {
        Self::new(name, Role::Replica)
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }
}

/// Largest accepted connection weight. Round-robin gives a member one
/// rotation slot per unit of weight.
pub const MAX_WEIGHT: u32 = 1_000;

fn default_weight() -> u32 {
    1
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert!(config.sticky);
        assert_eq!(config.primary_ttl(), Duration::from_secs(5));
        assert_eq!(config.blacklist_duration(), Duration::from_secs(30));
        assert_eq!(config.replica_strategy, "round_robin");
    }

    #[test]
    fn test_parse_toml() {
        let config: RouterConfig = toml::from_str(
            r#"
            name = "orders"
            primary_ttl_ms = 2000
            replica_strategy = "failover"

            [[connections]]
            name = "p1"
            role = "primary"
            url = "postgres://p1/orders"

            [[connections]]
            name = "r1"
            role = "replica"
            weight = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "orders");
        assert!(config.sticky);
        assert_eq!(config.primary_ttl(), Duration::from_secs(2));
        assert_eq!(config.connections.len(), 2);
        assert_eq!(config.connections[1].role, Role::Replica);
        assert_eq!(config.connections[1].weight, 3);
        assert_eq!(config.connections_for(Role::Primary).count(), 1);
    }
}
