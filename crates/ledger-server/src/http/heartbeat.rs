use crate::error::{Error, Rendered};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use ledger_registry::HeartbeatRequest;

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

pub async fn heartbeat(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<impl IntoResponse, Rendered> {
    let debug = state.debug();
    let path_with_query = match query {
        Some(q) if !q.is_empty() => format!("/v1/services/{instance_id}/heartbeat?{q}"),
        _ => format!("/v1/services/{instance_id}/heartbeat"),
    };

    let req = HeartbeatRequest {
        instance_id,
        path_with_query,
        ts: header_str(&headers, "x-timestamp"),
        nonce: header_str(&headers, "x-nonce"),
        kid: header_str(&headers, "x-key-id"),
        signature: header_str(&headers, "x-signature"),
        raw_body: body.to_vec(),
    };

    let instance = state
        .heartbeat
        .heartbeat(req)
        .await
        .map_err(|e| Rendered(Error::Base(e), debug))?;

    Ok((StatusCode::OK, Json(serde_json::json!({
        "instance_id": instance.instance_id,
        "status": instance.status,
        "consecutive_miss": instance.consecutive_miss,
        "lease_ttl_sec": instance.lease_ttl_sec(),
    }))))
}
