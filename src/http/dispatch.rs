//! Per-request dispatch: classify, identify, route, forward.
//!
//! # Data Flow
//! ```text
//! Request
//!     → Classifier
//!         Forbidden                         → 403
//!         Scep | Api | Home | Repo          → legacy proxy
//!         ManagementCommand
//!             → bounded body read           → 413 / 400
//!             → plist UDID extraction       → 400 on failure
//!             → PolicyStore::decide         → legacy | new proxy
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::migration::{extract_identifier, IdentityError, RouteDecision};
use crate::observability::metrics;
use crate::routing::RequestCategory;
use crate::security::limits::{read_body_limited, BodyLimitError};
use crate::upstream::ProxyError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("forbidden")]
    Forbidden,

    #[error(transparent)]
    Body(#[from] BodyLimitError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Upstream(#[from] ProxyError),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Forbidden => StatusCode::FORBIDDEN,
            DispatchError::Body(BodyLimitError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::Body(BodyLimitError::Read(_)) => StatusCode::BAD_REQUEST,
            DispatchError::Identity(_) => StatusCode::BAD_REQUEST,
            DispatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        match self {
            DispatchError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            DispatchError::Upstream(e) => e.into_response(),
            DispatchError::Identity(IdentityError::MalformedBody { .. }) => {
                (StatusCode::BAD_REQUEST, "malformed request body").into_response()
            }
            other => (other.status(), other.to_string()).into_response(),
        }
    }
}

/// Fallback handler for everything that is not health or admin.
pub async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).to_owned();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let category = state.classifier.classify(&request);

    match handle(&state, category, request, client_addr).await {
        Ok((decision, response)) => {
            tracing::debug!(
                request_id = %request_id,
                method = %method,
                path = %path,
                category = %category,
                backend = %decision,
                status = %response.status(),
                "Proxied request"
            );
            metrics::record_request(category.as_str(), decision.as_str(), response.status().as_u16(), start);
            response
        }
        Err(DispatchError::Forbidden) => {
            if state.log_skipped {
                tracing::info!(request_id = %request_id, method = %method, uri = %truncate_for_log(&path), client = ?client_addr, "Skipped request");
            } else {
                tracing::debug!(request_id = %request_id, method = %method, uri = %truncate_for_log(&path), "Skipped request");
            }
            metrics::record_forbidden();
            DispatchError::Forbidden.into_response()
        }
        Err(e) => {
            match &e {
                DispatchError::Identity(IdentityError::MalformedBody { body, source }) => {
                    if state.debug {
                        tracing::warn!(request_id = %request_id, path = %path, error = %source, body = %String::from_utf8_lossy(body), "Undecodable command body");
                    } else {
                        tracing::warn!(request_id = %request_id, path = %path, error = %source, "Undecodable command body");
                    }
                }
                DispatchError::Upstream(err) => {
                    tracing::error!(request_id = %request_id, path = %path, error = %err, "Upstream error");
                }
                other => {
                    tracing::warn!(request_id = %request_id, path = %path, error = %other, "Rejected request");
                }
            }
            metrics::record_request(category.as_str(), "none", e.status().as_u16(), start);
            e.into_response()
        }
    }
}

fn truncate_for_log(path: &str) -> &str {
    // Scanner paths can be long; keep log lines bounded.
    match path.char_indices().nth(256) {
        Some((idx, _)) => &path[..idx],
        None => path,
    }
}

async fn handle(
    state: &AppState,
    category: RequestCategory,
    request: Request<Body>,
    client_addr: Option<SocketAddr>,
) -> Result<(RouteDecision, Response), DispatchError> {
    let decision = match category {
        RequestCategory::Forbidden => return Err(DispatchError::Forbidden),
        RequestCategory::CertificateEnrollment
        | RequestCategory::ManagementApi
        | RequestCategory::Home
        | RequestCategory::Repository => RouteDecision::Legacy,
        RequestCategory::ManagementCommand => {
            return route_command(state, request, client_addr).await;
        }
    };

    let response = state
        .backend(decision)
        .forward(request, client_addr, state.forwarded_proto)
        .await?;
    Ok((decision, response))
}

async fn route_command(
    state: &AppState,
    request: Request<Body>,
    client_addr: Option<SocketAddr>,
) -> Result<(RouteDecision, Response), DispatchError> {
    let (parts, body) = request.into_parts();
    let bytes = read_body_limited(&parts.headers, body, state.max_body_size).await?;

    // An empty body yields "" and is routed like any other identifier.
    let udid = extract_identifier(&bytes)?;
    let decision = state.policy.decide(&udid);
    tracing::debug!(udid = %udid, backend = %decision, "Routing management command");

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = state
        .backend(decision)
        .forward(request, client_addr, state.forwarded_proto)
        .await?;
    Ok((decision, response))
}
