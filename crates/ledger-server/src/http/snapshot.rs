use crate::error::{Error, Rendered};
use crate::state::AppState;
use axum::extract::{RawQuery, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use ledger_common::{AuthError, BaseError};
use ledger_registry::HeartbeatRequest;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Debugging/polling read of the current registry snapshot. Fanout itself
/// is push-based; this exists for consumers that want to pull instead.
/// Authenticated the same way as a heartbeat, with the caller identifying
/// itself via `X-Instance-Id` since the route carries no instance id of its
/// own.
pub async fn snapshot(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> std::result::Result<impl IntoResponse, Rendered> {
    let debug = state.debug();

    let instance_id = header_str(&headers, "x-instance-id").ok_or_else(|| {
        Rendered(Error::Base(BaseError::Auth(AuthError::InvalidInstance)), debug)
    })?;

    let path_with_query = match query {
        Some(q) if !q.is_empty() => format!("/v1/services/snapshot?{q}"),
        _ => "/v1/services/snapshot".to_string(),
    };

    let verify_req = HeartbeatRequest {
        instance_id,
        path_with_query,
        ts: header_str(&headers, "x-timestamp"),
        nonce: header_str(&headers, "x-nonce"),
        kid: header_str(&headers, "x-key-id"),
        signature: header_str(&headers, "x-signature"),
        raw_body: Vec::new(),
    };
    state
        .heartbeat
        .verify_only(verify_req)
        .await
        .map_err(|e| Rendered(Error::Base(e), debug))?;

    let snapshot = ledger_fanout::build_snapshot(&state.repository)
        .await
        .map_err(|e| Rendered(Error::Base(e), debug))?;
    Ok((StatusCode::OK, Json(snapshot)))
}
