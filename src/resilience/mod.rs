//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Routed operation fails:
//!     → classifier.rs (connection-level or not?)
//!     → connection-level: pool blacklists the member, retries the next candidate
//!     → otherwise: error surfaces unchanged, health untouched
//! ```
//!
//! # Design Decisions
//! - Retries are bounded by pool size and never sleep
//! - Escalation (replica → primary, primary exhaustion reset) lives in routing::engine

pub mod classifier;

pub use classifier::{ErrorClassifier, Verdict, DEFAULT_MATCHERS};
