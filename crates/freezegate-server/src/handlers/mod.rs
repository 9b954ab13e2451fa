//! Request handlers for the REST/webhook API (§6).

pub mod admission;
pub mod dryrun;
pub mod exemptions;
pub mod freeze;
pub mod health;
pub mod history;
pub mod metrics;
pub mod schedules;
pub mod templates;

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::auth::extract_bearer;
use crate::error::ApiError;
use crate::state::AppState;

/// Shared auth gate for every token-authenticated REST route. Returns the
/// authenticated username on success.
pub async fn require_auth(state: &Arc<AppState>, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = extract_bearer(headers).ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
    let policy = state.context.config_loader.get_config();
    state.authenticator.authenticate(token, &policy.api_allowed_serviceaccounts).await
}
