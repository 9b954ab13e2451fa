//! `/freeze/status`, `/freeze/enable`, `/freeze/disable` — the manual
//! freeze toggle layered on top of the Schedule Store's declarative
//! windows. Enabling/disabling patches the `policy` record directly and
//! forces an out-of-band reload so the change is visible immediately
//! instead of waiting for the next watch/poll tick.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use freezegate_kernel::model::Schedule;
use freezegate_kernel::store::ResourceRecord;

use crate::error::ApiResult;
use crate::handlers::require_auth;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FreezeStatusResponse {
    pub freeze_enabled: bool,
    pub freeze_until: Option<DateTime<Utc>>,
    pub freeze_message: String,
    pub active: bool,
    pub active_window: Option<String>,
    pub active_schedules: Vec<Schedule>,
}

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = state.context.policy_snapshot();
    let now = state.context.clock.now();
    let (active, active_window) = freezegate_core::schedule::is_freeze_active(&policy, now, None);
    let active_schedules = freezegate_core::schedule::active_schedules(&policy.freeze_schedule, now, None, &policy.bypass_exempt_namespaces)
        .into_iter()
        .cloned()
        .collect();

    Json(FreezeStatusResponse {
        freeze_enabled: policy.freeze_enabled,
        freeze_until: policy.freeze_until,
        freeze_message: policy.freeze_message,
        active,
        active_window,
        active_schedules,
    })
}

#[derive(Debug, Deserialize)]
pub struct EnableRequest {
    pub until: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub namespaces: Option<BTreeSet<String>>,
}

pub async fn enable(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<EnableRequest>) -> ApiResult<impl IntoResponse> {
    let actor = require_auth(&state, &headers).await?;

    // A manual freeze (as opposed to a declarative Schedule) applies
    // cluster-wide; per-namespace scoping belongs in a Schedule record, so
    // `namespaces` here is accepted for API compatibility and carried into
    // the history entry but does not change the policy record.
    let record_name = state.context.config_loader.record_name().to_string();
    let mut data = state.context.store.read(&record_name).await?.map(|r| r.data).unwrap_or_default();
    data.insert("freezeEnabled".to_string(), "true".to_string());
    data.insert("freezeUntil".to_string(), body.until.to_rfc3339());
    state.context.store.patch(&record_name, ResourceRecord { data, resource_version: String::new() }).await?;
    state.context.config_loader.force_reload().await?;

    state
        .context
        .history
        .record(freezegate_core::history::NewHistoryEvent {
            event_type: "freeze_enabled".to_string(),
            reason: body.reason,
            freeze_window: None,
            namespace: None,
            duration_minutes: None,
            triggered_by: Some(actor),
        })
        .await;

    Ok(Json(serde_json::json!({ "status": "enabled" })))
}

#[derive(Debug, Deserialize)]
pub struct DisableRequest {
    pub reason: String,
}

pub async fn disable(State(state): State<Arc<AppState>>, headers: HeaderMap, Json(body): Json<DisableRequest>) -> ApiResult<impl IntoResponse> {
    let actor = require_auth(&state, &headers).await?;

    let record_name = state.context.config_loader.record_name().to_string();
    let mut data = state.context.store.read(&record_name).await?.map(|r| r.data).unwrap_or_default();
    data.insert("freezeEnabled".to_string(), "false".to_string());
    data.remove("freezeUntil");
    state.context.store.patch(&record_name, ResourceRecord { data, resource_version: String::new() }).await?;
    state.context.config_loader.force_reload().await?;

    state
        .context
        .history
        .record(freezegate_core::history::NewHistoryEvent {
            event_type: "freeze_disabled".to_string(),
            reason: body.reason,
            freeze_window: None,
            namespace: None,
            duration_minutes: None,
            triggered_by: Some(actor),
        })
        .await;

    Ok(Json(serde_json::json!({ "status": "disabled" })))
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new()
        .route("/freeze/status", axum::routing::get(status))
        .route("/freeze/enable", axum::routing::post(enable))
        .route("/freeze/disable", axum::routing::post(disable))
}
