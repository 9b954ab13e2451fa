//! Freezegate admission gatekeeper — entry point.
//!
//! Reads configuration from environment and starts the axum-based HTTP
//! service exposing the admission webhook and the management REST API.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PORT` | `8443` | TCP port to listen on. |
//! | `NAMESPACE` | `default` | Controller namespace (diagnostic only; the in-memory store is not namespace-partitioned). |
//! | `CONFIGMAP_NAME` | `policy` | Policy record name. |
//! | `SCHEDULES_CONFIGMAP_NAME` | `schedules` | Schedule record name. |
//! | `LOG_LEVEL` | `info` | `tracing` filter directive. |
//! | `LOG_FORMAT` | `text` | `json` or `text`. |
//! | `STRICT_AUTH` | `true` | Disables the opaque-token fallback when `true`. |
//! | `API_KEY` | *(none)* | Dev-mode static API key. |
//!
//! `ResourceStore` is backed by an in-memory implementation here; a
//! Kubernetes ConfigMap/Secret-backed client binding is an external
//! cluster-client concern and is left as a documented extension point
//! (implement `ResourceStore` and swap the construction below).

use std::sync::Arc;

use freezegate_core::config_loader::{ConfigLoader, ReloadMode};
use freezegate_core::context::Context;
use freezegate_core::memory_store::InMemoryResourceStore;
use freezegate_kernel::clock::SystemClock;
use freezegate_notify::{Dispatcher, EventSinkSet};
use freezegate_server::auth::{ApiKeyCache, Authenticator, NullTokenReviewer};
use freezegate_server::rate_limit::RateLimiter;
use freezegate_server::state::AppState;
use tracing_subscriber::EnvFilter;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn init_logging() {
    let filter = EnvFilter::try_new(env_or("LOG_LEVEL", "info")).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if env_or("LOG_FORMAT", "text") == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() {
    init_logging();

    let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8443);
    let configmap_name = env_or("CONFIGMAP_NAME", "policy");
    let strict_auth = env_or("STRICT_AUTH", "true").eq_ignore_ascii_case("true");
    let api_key = std::env::var("API_KEY").ok();

    let store: Arc<dyn freezegate_kernel::store::ResourceStore> = Arc::new(InMemoryResourceStore::new());
    let clock = Arc::new(SystemClock);
    let config_loader = Arc::new(ConfigLoader::new(store.clone(), configmap_name, ReloadMode::Watch));

    let audit_log_file = std::env::var("AUDIT_LOG_FILE").unwrap_or_else(|_| "/var/log/freezegate/audit.jsonl".to_string());
    let audit_dispatcher = Dispatcher::new(vec![Box::new(freezegate_notify::sinks::FileSink::new(std::path::PathBuf::from(audit_log_file)))]);
    let notification_dispatcher = Dispatcher::new(Vec::new());
    let sink = Arc::new(EventSinkSet::new(notification_dispatcher, audit_dispatcher));

    let context = Arc::new(Context::new(clock, store.clone(), config_loader, Some(sink)));
    if let Err(err) = context.load_all().await {
        tracing::error!(%err, "failed to load initial configuration, continuing with defaults");
    }

    let authenticator = Arc::new(Authenticator::new(Arc::new(NullTokenReviewer), ApiKeyCache::new(store, api_key), strict_auth));
    let rate_limiter = Arc::new(RateLimiter::new(100, std::time::Duration::from_secs(60)));
    let state = Arc::new(AppState::new(context, authenticator, rate_limiter));

    let app = freezegate_server::build_router(state);
    let addr = format!("0.0.0.0:{port}");
    tracing::info!(%addr, "freezegate admission gatekeeper starting");
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}
