//! `/freeze/schedules` (§4.D) — list and delete. Creation happens through
//! the Template Engine's `apply` (see `handlers::templates`) or by writing
//! the `schedules` record directly; this surface only exposes what the
//! external interface contract names.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::ApiResult;
use crate::handlers::require_auth;
use crate::state::AppState;

pub async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    Ok(Json(state.context.schedules.list()))
}

pub async fn delete(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(name): Path<String>) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    state.context.schedules.remove(&name).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new()
        .route("/freeze/schedules", axum::routing::get(list))
        .route("/freeze/schedules/{name}", axum::routing::delete(delete))
}
