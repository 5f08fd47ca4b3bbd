//! Upstream (backend proxy) subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher picks RouteDecision
//!     → proxy.rs (rewrite target, forwarding headers)
//!     → connector.rs (TCP, or rustls with server-name override)
//!     → hyper client pool (HTTP/1.1)
//!     → Response streamed back (or buffered + logged in debug mode)
//! ```
//!
//! # Design Decisions
//! - Exactly two upstreams, each with its own client and transport settings
//! - Upstream failures surface as 502; there is no retry or failover

pub mod connector;
pub mod proxy;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub use connector::UpstreamConnector;
pub use proxy::BackendProxy;

/// Errors from building or using a backend proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid TLS server name '{0}'")]
    InvalidServerName(String),

    #[error("TLS configuration error: {0}")]
    Tls(#[source] rustls::Error),

    #[error("invalid upstream target: {0}")]
    Uri(#[source] axum::http::uri::InvalidUri),

    #[error("failed to build upstream request: {0}")]
    Request(#[source] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] hyper_util::client::legacy::Error),

    #[error("failed to read upstream response: {0}")]
    UpstreamBody(#[source] hyper::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
    }
}
