//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, timeout, trace layers)
//!     → /healthz | /admin/* | dispatch.rs (fallback)
//!     → dispatch.rs (classify, extract UDID, pick backend)
//!     → upstream::BackendProxy (forward, relay response)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError};
