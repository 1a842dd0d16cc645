//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Connection names are unique and non-empty
//! - Weights are positive and at most `MAX_WEIGHT`
//! - The blacklist window is non-zero
//! - Strategy names are present
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - A missing primary is allowed; it surfaces at use as `NoConnectionsAvailable`
//! - Unknown strategy names are resolved later against the strategy registry

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{RouterConfig, MAX_WEIGHT};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("connection #{0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate connection name '{0}'")]
    DuplicateName(String),

    #[error("connection '{0}' has zero weight")]
    ZeroWeight(String),

    #[error("connection '{name}' has weight {weight}, above the maximum of {max}")]
    WeightTooLarge { name: String, weight: u32, max: u32 },

    #[error("blacklist_duration_ms must be greater than zero")]
    ZeroBlacklistDuration,

    #[error("{0} must not be empty")]
    EmptyStrategy(&'static str),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, conn) in config.connections.iter().enumerate() {
        if conn.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName(i));
        } else if !seen.insert(conn.name.as_str()) {
            errors.push(ValidationError::DuplicateName(conn.name.clone()));
        }
        if conn.weight == 0 {
            errors.push(ValidationError::ZeroWeight(conn.name.clone()));
        } else if conn.weight > MAX_WEIGHT {
            errors.push(ValidationError::WeightTooLarge {
                name: conn.name.clone(),
                weight: conn.weight,
                max: MAX_WEIGHT,
            });
        }
    }

    if config.blacklist_duration_ms == 0 {
        errors.push(ValidationError::ZeroBlacklistDuration);
    }

    if config.primary_strategy.trim().is_empty() {
        errors.push(ValidationError::EmptyStrategy("primary_strategy"));
    }
    if config.replica_strategy.trim().is_empty() {
        errors.push(ValidationError::EmptyStrategy("replica_strategy"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
