//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, target)
//!     → classifier.rs (ordered rule table)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: RequestCategory (Forbidden on no match)
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - No regex in hot path (prefix/substring matching only)
//! - Deterministic: same input always yields the same category
//! - First match wins

pub mod classifier;
pub mod matcher;

pub use classifier::{Classifier, RequestCategory};
