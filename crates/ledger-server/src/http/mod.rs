mod admin;
mod heartbeat;
mod register;
mod snapshot;

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(admin::healthz))
        .route("/v1/services/register", post(register::register))
        .route("/v1/services/{instance_id}/heartbeat", post(heartbeat::heartbeat))
        .route("/v1/services/snapshot", get(snapshot::snapshot))
        .route("/v1/services", get(admin::list_services))
        .route("/v1/services/by-name/{name}", get(admin::get_service))
        .route("/v1/registry/version", get(admin::registry_version))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
