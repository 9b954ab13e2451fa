//! `/freeze/exemptions` CRUD (§4.F).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::handlers::require_auth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub namespace: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(query): Query<ListQuery>) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    let exemptions = state.context.exemptions.list(query.namespace.as_deref(), query.active_only);
    Ok(Json(exemptions))
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub namespace: String,
    #[serde(default)]
    pub resource_name: Option<String>,
    pub duration_minutes: i64,
    pub reason: String,
    pub approved_by: String,
}

pub async fn create(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<CreateRequest>) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    if body.duration_minutes <= 0 {
        return Err(ApiError::BadRequest("duration_minutes must be positive".to_string()));
    }
    let exemption = state
        .context
        .exemptions
        .create(freezegate_core::exemption::NewExemption {
            namespace: body.namespace,
            resource_name: body.resource_name,
            duration_minutes: body.duration_minutes,
            reason: body.reason,
            approved_by: body.approved_by,
        })
        .await?;
    Ok((axum::http::StatusCode::CREATED, Json(exemption)))
}

pub async fn get(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    state.context.exemptions.get(id).map(Json).ok_or_else(|| ApiError::NotFound(format!("exemption '{id}' not found")))
}

pub async fn delete(State(state): State<Arc<AppState>>, headers: HeaderMap, Path(id): Path<Uuid>) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    state.context.exemptions.delete(id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new()
        .route("/freeze/exemptions", axum::routing::get(list).post(create))
        .route("/freeze/exemptions/{id}", axum::routing::get(get).delete(delete))
}
