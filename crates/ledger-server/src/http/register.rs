use crate::error::{Error, Rendered};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use ledger_registry::BootstrapRequest;
use serde::Deserialize;
use tracing::{info, warn};

/// Shape of the register request body; `capabilities` is accepted but not
/// yet persisted, matching the upstream `get_or_create_service` which never
/// threads it onto the `Service` row either.
#[derive(Debug, Deserialize)]
struct RegisterBody {
    service_name: String,
    base_url: String,
    health_url: Option<String>,
    heartbeat_interval_sec: Option<i64>,
    #[serde(default)]
    #[allow(dead_code)]
    capabilities: Option<serde_json::Value>,
    meta: Option<serde_json::Value>,
    bootstrap_secret_ref: String,
    boot_id: Option<String>,
    node_id: Option<String>,
    task_slot: Option<i64>,
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Pulls the raw token out of `Authorization: Bearer <token>`, matching the
/// upstream middleware's `request.headers["Authorization"].split(" ")[1]`.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, "authorization")?;
    let mut parts = value.splitn(2, ' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<impl IntoResponse, Rendered> {
    let debug = state.debug();
    let parsed: RegisterBody = serde_json::from_slice(&body).map_err(|e| {
        Rendered(Error::bad_request(format!("malformed request body: {e}")), debug)
    })?;

    let req = BootstrapRequest {
        service_name: parsed.service_name,
        bootstrap_secret_ref: parsed.bootstrap_secret_ref,
        token: bearer_token(&headers),
        node_id: parsed.node_id,
        task_slot: parsed.task_slot,
        boot_id: parsed.boot_id,
        base_url: parsed.base_url,
        health_url: parsed.health_url,
        heartbeat_interval_sec: parsed.heartbeat_interval_sec,
        meta: parsed.meta,
        ts: header_str(&headers, "x-timestamp"),
        nonce: header_str(&headers, "x-nonce"),
        signature: header_str(&headers, "x-signature"),
        raw_body: body.to_vec(),
    };

    let response = state
        .registration
        .register(req)
        .await
        .map_err(|e| Rendered(Error::Base(e), debug))?;

    info!(service_id = %response.service_id, instance_id = %response.instance_id, "instance registered");

    let repository = state.repository.clone();
    let secrets = state.secrets.clone();
    let http = state.http.clone();
    tokio::spawn(async move {
        match ledger_fanout::build_snapshot(&repository).await {
            Ok(snapshot) => {
                if let Err(e) = ledger_fanout::fanout_snapshot(&repository, &secrets, &http, &snapshot).await {
                    warn!(error = %e, "post-registration fanout failed");
                }
            }
            Err(e) => warn!(error = %e, "failed to build snapshot for post-registration fanout"),
        }
    });

    Ok((StatusCode::OK, Json(response)))
}
