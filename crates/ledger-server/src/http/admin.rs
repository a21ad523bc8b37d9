use crate::error::{Error, Rendered};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};

pub async fn list_services(
    State(state): State<AppState>,
) -> std::result::Result<impl IntoResponse, Rendered> {
    let debug = state.debug();
    let services = state
        .reads
        .list_services()
        .await
        .map_err(|e| Rendered(Error::Base(e), debug))?;
    Ok((StatusCode::OK, Json(services)))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> std::result::Result<impl IntoResponse, Rendered> {
    let debug = state.debug();
    match state.reads.get_service(&name).await.map_err(|e| Rendered(Error::Base(e), debug))? {
        Some(view) => Ok((StatusCode::OK, Json(view))),
        None => Err(Rendered(Error::bad_request("unknown service name"), debug)),
    }
}

pub async fn registry_version(
    State(state): State<AppState>,
) -> std::result::Result<impl IntoResponse, Rendered> {
    let debug = state.debug();
    let version = state
        .reads
        .registry_version()
        .await
        .map_err(|e| Rendered(Error::Base(e), debug))?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "registry_version": version }))))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
