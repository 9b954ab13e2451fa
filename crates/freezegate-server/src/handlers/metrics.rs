//! `GET /metrics` — Prometheus text exposition, hand-rendered from a
//! point-in-time snapshot rather than a registry crate: gauges reflecting
//! current freeze/config-loader state rather than counters that would
//! need threading increments through every call site.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;

use crate::state::AppState;

fn write_gauge(out: &mut String, name: &str, help: &str, value: f64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = state.context.policy_snapshot();
    let now = state.context.clock.now();
    let (active, _) = freezegate_core::schedule::is_freeze_active(&policy, now, None);

    let mut out = String::with_capacity(1024);
    write_gauge(&mut out, "freezegate_freeze_active", "Whether a freeze window is currently active", if active { 1.0 } else { 0.0 });
    write_gauge(&mut out, "freezegate_config_ready", "Whether the Config Loader has completed its initial load", if state.context.config_loader.is_ready() { 1.0 } else { 0.0 });
    write_gauge(&mut out, "freezegate_config_reload_errors_total", "Cumulative Config Loader reload failures", state.context.config_loader.get_reload_errors() as f64);
    write_gauge(&mut out, "freezegate_schedules_total", "Number of configured freeze schedules", policy.freeze_schedule.len() as f64);
    write_gauge(&mut out, "freezegate_exemptions_active", "Number of currently valid temporary exemptions", state.context.exemptions.list(None, true).len() as f64);

    ([("content-type", "text/plain; version=0.0.4; charset=utf-8")], out)
}

pub fn router() -> axum::Router<Arc<AppState>> {
    axum::Router::new().route("/metrics", axum::routing::get(metrics))
}
