//! Bearer-token authentication for the admin endpoints.
//!
//! Fail closed: with no secret configured every admin request is rejected,
//! whatever it presents.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::admin::AdminError;
use crate::http::server::AppState;

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// True if the headers carry `Authorization: Bearer <secret>`.
pub fn is_authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| constant_time_eq(token.as_bytes(), secret.as_bytes()))
}

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AdminError> {
    if is_authorized(request.headers(), state.admin_secret.as_deref()) {
        return Ok(next.run(request).await);
    }

    if state.admin_secret.is_none() {
        tracing::warn!(path = %request.uri().path(), "Admin request rejected: no admin secret configured");
    } else {
        tracing::warn!(path = %request.uri().path(), "Admin request rejected: bad credentials");
    }
    Err(AdminError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn bearer(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn no_secret_rejects_everything() {
        assert!(!is_authorized(&bearer("Bearer "), None));
        assert!(!is_authorized(&bearer("Bearer anything"), None));
    }

    #[test]
    fn exact_match_only() {
        let secret = Some("s3cret");
        assert!(is_authorized(&bearer("Bearer s3cret"), secret));
        assert!(!is_authorized(&bearer("Bearer s3cret "), secret));
        assert!(!is_authorized(&bearer("bearer s3cret"), secret));
        assert!(!is_authorized(&bearer("Basic s3cret"), secret));
        assert!(!is_authorized(&bearer("Bearer s3cre"), secret));
        assert!(!is_authorized(&HeaderMap::new(), secret));
    }

    #[test]
    fn constant_time_eq_lengths() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
