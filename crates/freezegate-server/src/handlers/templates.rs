//! `/freeze/templates` (§4.K) — list, reload from the backing record, and
//! apply a named template into a new Schedule.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use freezegate_core::template::TemplateParameters;

use crate::error::ApiResult;
use crate::handlers::require_auth;
use crate::state::AppState;

pub async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    Ok(Json(state.context.templates.list()))
}

pub async fn reload(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    state.context.templates.reload().await?;
    Ok(Json(state.context.templates.list()))
}

#[derive(Debug, Deserialize)]
pub struct ApplyRequest {
    pub template_name: String,
    #[serde(default)]
    pub parameters: TemplateParameters,
}

pub async fn apply(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<ApplyRequest>) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    let schedule = state.context.templates.apply(&body.template_name, body.parameters)?;
    state.context.schedules.add(schedule.clone()).await?;
    Ok((axum::http::StatusCode::CREATED, Json(schedule)))
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new()
        .route("/freeze/templates", axum::routing::get(list))
        .route("/freeze/templates/reload", axum::routing::post(reload))
        .route("/freeze/templates/apply", axum::routing::post(apply))
}
