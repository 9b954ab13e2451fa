//! `POST /admission` — the Kubernetes `AdmissionReview` webhook boundary.
//! Unwraps the envelope, runs it through the Admission Engine, and
//! re-wraps the verdict. Not token-authenticated: the apiserver reaches
//! this endpoint over the webhook's own TLS configuration, not a bearer
//! token.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use freezegate_kernel::admission::AdmissionRequest;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdmissionReview {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub request: AdmissionRequest,
}

#[derive(Debug, Serialize)]
pub struct AdmissionReviewResponse {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub response: Value,
}

/// Shapes the engine's internal verdict into the wire contract the
/// apiserver expects: `warnings` as plain message strings (not the rich
/// internal `Warning` objects) and `status_code`/`message` nested under a
/// single `status` object. The apiserver rejects a non-string warning
/// array and has no notion of a flat `status_code` field.
pub fn to_wire_response(verdict: freezegate_kernel::admission::AdmissionResponse) -> Value {
    let mut response = serde_json::json!({
        "uid": verdict.uid,
        "allowed": verdict.allowed,
    });
    if let Some(code) = verdict.status_code {
        response["status"] = serde_json::json!({
            "code": code,
            "message": verdict.message.unwrap_or_default(),
        });
    }
    if !verdict.warnings.is_empty() {
        let messages: Vec<Value> = verdict.warnings.into_iter().map(|w| Value::String(w.message)).collect();
        response["warnings"] = Value::Array(messages);
    }
    response
}

pub async fn admission(State(state): State<Arc<AppState>>, Json(review): Json<AdmissionReview>) -> ApiResult<impl IntoResponse> {
    let policy = state.context.policy_snapshot();
    let fail_closed_if_unready = !state.context.config_loader.is_ready() && policy.fail_closed;
    let verdict = state.context.engine.decide(review.request, policy, fail_closed_if_unready).await;

    Ok(Json(AdmissionReviewResponse {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
        response: to_wire_response(verdict),
    }))
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new().route("/admission", axum::routing::post(admission))
}
