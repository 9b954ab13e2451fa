//! `POST /dryrun/evaluate` — runs a synthetic admission request through the
//! same engine a live webhook call would hit, without Kubernetes in the
//! loop. The caller must mark the request `dryRun: true` themselves; a
//! request that isn't already dry-run is a malformed-input 400, not an
//! implicit upgrade, so the returned warnings always reflect what the
//! caller actually asked to evaluate.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use freezegate_kernel::admission::AdmissionRequest;

use crate::error::{ApiError, ApiResult};
use crate::handlers::require_auth;
use crate::handlers::admission::to_wire_response;
use crate::state::AppState;

pub async fn evaluate(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(request): Json<AdmissionRequest>) -> ApiResult<impl IntoResponse> {
    require_auth(&state, &headers).await?;
    if !request.is_dry_run() {
        return Err(ApiError::BadRequest("request must set dryRun to evaluate without side effects".to_string()));
    }
    let policy = state.context.policy_snapshot();
    let verdict = state.context.engine.decide(request, policy, false).await;
    Ok(Json(to_wire_response(verdict)))
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new().route("/dryrun/evaluate", axum::routing::post(evaluate))
}
