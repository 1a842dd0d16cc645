//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / pool decisions:
//!     → tracing events (structured fields: role, connection, reason, error)
//!     → metrics.rs (counters through the `metrics` facade)
//!
//! Consumers:
//!     → logging.rs installs the subscriber (binaries and tests only)
//!     → any `metrics` recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a global subscriber or recorder itself
//! - Metrics are cheap when no recorder is installed (no-op facade)

pub mod logging;
pub mod metrics;
