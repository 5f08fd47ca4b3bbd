//! Admin control plane: runtime mutation of the migration policy.

pub mod auth;
pub mod handlers;

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use thiserror::Error;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;
use crate::migration::PolicyError;
use crate::security::limits::BodyLimitError;

pub const PERCENTAGE_PATH: &str = "/admin/percentage";
pub const UDIDS_PATH: &str = "/admin/udids";
pub const POLICY_PATH: &str = "/admin/policy";

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("unprocessable body: {0}")]
    UnprocessableBody(String),

    #[error(transparent)]
    InvalidRange(#[from] PolicyError),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::Unauthorized => StatusCode::UNAUTHORIZED,
            AdminError::UnprocessableBody(_) | AdminError::InvalidRange(_) => StatusCode::BAD_REQUEST,
            AdminError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AdminError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Admin request failed");
        }
        (status, format!("{self}\n")).into_response()
    }
}

impl From<BodyLimitError> for AdminError {
    fn from(err: BodyLimitError) -> Self {
        match err {
            BodyLimitError::TooLarge { limit } => AdminError::PayloadTooLarge { limit },
            BodyLimitError::Read(e) => AdminError::Internal(e),
        }
    }
}

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(PERCENTAGE_PATH, post(update_percentage))
        .route(UDIDS_PATH, post(update_udids))
        .route(POLICY_PATH, get(get_policy))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_limit_errors_map_to_client_and_server_statuses() {
        let too_large = AdminError::from(BodyLimitError::TooLarge { limit: 16 });
        assert_eq!(too_large.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);

        let read = AdminError::from(BodyLimitError::Read("connection reset".into()));
        assert_eq!(read.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
