//! Stickiness context subsystem.
//!
//! # Data Flow
//! ```text
//! write routed to primary
//!     → engine.stick_to_primary()
//!     → sticky.rs (identity → stick-until)
//!
//! later read for the same identity
//!     → sticky.rs is_stuck? → primary
//!
//! unit-of-work boundary (external)
//!     → release(identity) / reset()
//! ```
//!
//! # Design Decisions
//! - Shared by every engine using the same identity space
//! - Entries expire by time only; nothing sweeps them

pub mod sticky;

pub use sticky::StickyContext;
