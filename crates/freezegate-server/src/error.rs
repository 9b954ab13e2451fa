//! REST/webhook-layer error taxonomy (§7). Maps caller mistakes, policy
//! denials, and internal failures to the HTTP codes the external interface
//! contract names. Admission decisions never flow through this type — the
//! engine's `AdmissionResponse` already carries its own status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                "rate limit exceeded".to_string(),
            ),
            ApiError::Internal(err) => {
                tracing::error!(%err, "internal error handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "internal error".to_string())
            }
        };

        let body = Json(json!({ "error": { "code": code, "message": message } }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<freezegate_kernel::error::ScheduleError> for ApiError {
    fn from(err: freezegate_kernel::error::ScheduleError) -> Self {
        use freezegate_kernel::error::ScheduleError as E;
        match err {
            E::NotFound { name } => ApiError::NotFound(format!("schedule '{name}' not found")),
            E::AlreadyExists { name } => ApiError::BadRequest(format!("schedule '{name}' already exists")),
            E::InvalidCron { expr, reason } => ApiError::BadRequest(format!("invalid cron expression '{expr}': {reason}")),
            E::InvalidRange { name } => ApiError::BadRequest(format!("schedule '{name}' is structurally invalid")),
            E::Store(source) => ApiError::Internal(source.into()),
            _ => ApiError::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

impl From<freezegate_kernel::error::ExemptionError> for ApiError {
    fn from(err: freezegate_kernel::error::ExemptionError) -> Self {
        use freezegate_kernel::error::ExemptionError as E;
        match err {
            E::NotFound { id } => ApiError::NotFound(format!("exemption '{id}' not found")),
            E::Store(source) => ApiError::Internal(source.into()),
            _ => ApiError::Internal(anyhow::anyhow!(err.to_string())),
        }
    }
}

impl From<freezegate_kernel::error::ConfigError> for ApiError {
    fn from(err: freezegate_kernel::error::ConfigError) -> Self {
        ApiError::Internal(err.into())
    }
}
