//! Freezegate transport boundary: axum router, auth, REST rate limiting,
//! and the HTTP handlers for the webhook and management API (§6).

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod state;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn rate_limit_middleware(State(state): State<Arc<AppState>>, headers: HeaderMap, request: axum::extract::Request, next: Next) -> Response {
    let key = client_key(&headers);
    if !state.rate_limiter.check(&key) {
        return (StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
    }
    next.run(request).await
}

/// Builds the full axum `Router` for the process. Operational probes
/// (`/health`, `/ready`, `/metrics`) and the admission webhook are exempt
/// from the REST-surface rate limiter; the webhook is rate-shaped by the
/// apiserver, not by this process.
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    let operational = handlers::health::router().merge(handlers::metrics::router()).merge(handlers::admission::router());

    let managed = handlers::freeze::router()
        .merge(handlers::exemptions::router())
        .merge(handlers::schedules::router())
        .merge(handlers::templates::router())
        .merge(handlers::history::router())
        .merge(handlers::dryrun::router())
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    operational
        .merge(managed)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
