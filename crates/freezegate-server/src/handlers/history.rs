//! `GET /freeze/history` — filtered, reverse-chronological event log.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::handlers::require_auth;
use crate::state::AppState;

fn default_limit() -> usize {
    100
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub event_type: Option<String>,
    pub namespace: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn list(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(query): Query<HistoryQuery>) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    let events = state.context.history.list(query.event_type.as_deref(), query.namespace.as_deref(), query.limit);
    Ok(Json(events))
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new().route("/freeze/history", axum::routing::get(list))
}
