//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → admin::auth (bearer secret, admin paths only)
//!     → routing::classifier (open-relay and scanner rejection)
//!     → limits.rs (bounded body read on the command channel)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Forward upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod headers;
pub mod limits;
