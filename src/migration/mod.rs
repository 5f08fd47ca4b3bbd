//! Migration subsystem.
//!
//! # Data Flow
//! ```text
//! Management-command request body
//!     → identity.rs (plist → UDID)
//!     → policy.rs (shared read lock on MigrationPolicy)
//!     → router.rs (explicit set, then crc32 bucket vs percentage)
//!     → RouteDecision { Legacy | New }
//!
//! Admin update:
//!     → policy.rs (exclusive write lock, wholesale replace)
//! ```
//!
//! # Design Decisions
//! - Routing is a pure function of (udid, policy)
//! - The explicit set always wins over the percentage
//! - Policy lives in memory only

pub mod identity;
pub mod policy;
pub mod router;

pub use identity::{extract_identifier, IdentityError};
pub use policy::{MigrationPolicy, Percentage, PolicyError, PolicyStore};
pub use router::{route, RouteDecision};
