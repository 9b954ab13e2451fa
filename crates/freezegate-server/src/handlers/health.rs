//! `GET /health`, `GET /ready` — liveness and readiness probes. Neither is
//! token-authenticated; a load balancer or kubelet needs to reach these
//! unconditionally.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ready = state.context.config_loader.is_ready();
    let status = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "reload_errors": state.context.config_loader.get_reload_errors(),
            "last_successful_load": state.context.config_loader.last_successful_load(),
        })),
    )
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new()
        .route("/health", axum::routing::get(health))
        .route("/ready", axum::routing::get(ready))
}
