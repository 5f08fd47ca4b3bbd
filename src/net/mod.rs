//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! std TcpListener (bound by main or a test)
//!     → tls.rs (optional rustls acceptor config)
//!     → axum-server (accept, handshake, HTTP/1.1 + HTTP/2)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional and terminated in-process
//! - Upstream TLS lives in `upstream::connector`, not here

pub mod tls;
