use axum::{body::Body, extract::State, http::HeaderMap, Json};
use serde::Serialize;

use crate::admin::AdminError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::limits::read_body_limited;

/// Admin bodies are a number or a UDID list; anything bigger is a mistake.
pub const MAX_ADMIN_BODY: usize = 4 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct PolicyStatus {
    pub percentage: u8,
    pub udids: Vec<String>,
}

async fn read_text(headers: &HeaderMap, body: Body) -> Result<String, AdminError> {
    let bytes = read_body_limited(headers, body, MAX_ADMIN_BODY).await?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| AdminError::UnprocessableBody("body is not valid UTF-8".into()))
}

/// `POST /admin/percentage`: body is a decimal integer in `[0, 100]`.
pub async fn update_percentage(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<String, AdminError> {
    let text = read_text(&headers, body).await?;
    let value: i64 = text.trim().parse().map_err(|_| {
        AdminError::UnprocessableBody(format!("'{}' is not an integer", text.trim()))
    })?;

    let percentage = state.policy.set_percentage(value)?;
    metrics::record_policy_update("percentage");
    metrics::set_percentage(percentage.get());
    tracing::info!(percentage = percentage.get(), "Migration percentage updated");

    Ok(format!("migration percentage set to {}\n", percentage.get()))
}

/// `POST /admin/udids`: whitespace-separated UDIDs, replacing the whole set.
pub async fn update_udids(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<String, AdminError> {
    let text = read_text(&headers, body).await?;
    let count = state.policy.replace_identifier_set(text.split_whitespace());
    metrics::record_policy_update("udids");
    tracing::info!(count, "Migrated UDID set replaced");

    Ok(format!("migrating {count} explicitly listed udids\n"))
}

/// `GET /admin/policy`: current policy, for diagnostics.
pub async fn get_policy(State(state): State<AppState>) -> Json<PolicyStatus> {
    let snapshot = state.policy.snapshot();
    let mut udids: Vec<String> = snapshot.included.into_iter().collect();
    udids.sort();

    Json(PolicyStatus {
        percentage: snapshot.percentage.get(),
        udids,
    })
}
