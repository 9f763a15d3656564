use axum::{extract::State, response::Response, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    arguments::is_debug_webserver_enabled,
    logger::{self, LogTag},
    webserver::{state::AppState, utils::success_response},
};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" once either background loop has stopped
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub connected_clients: usize,
    pub coordinator_listening: bool,
    pub registry_timers: bool,
    pub source: &'static str,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

/// GET /api/health
async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let app = &state.app;
    let coordinator_listening = app.coordinator.is_listening();
    let registry_timers = app.registry.timers_running();

    if is_debug_webserver_enabled() {
        logger::debug(
            LogTag::Webserver,
            &format!(
                "Health probe: coordinator={} timers={}",
                coordinator_listening, registry_timers
            ),
        );
    }

    success_response(HealthResponse {
        status: if coordinator_listening && registry_timers {
            "ok"
        } else {
            "degraded"
        },
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        connected_clients: app.registry.get_connected_clients_count(),
        coordinator_listening,
        registry_timers,
        source: app.aggregator.source_name(),
    })
}
