/// Realtime admin endpoints
///
/// Introspection and maintenance of the connection registry, the update
/// coordinator and the snapshot cache.
use axum::{extract::State, http::StatusCode, response::Response, routing::get, routing::post, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    arguments::is_debug_webserver_enabled,
    coordinator::CoordinatorStats,
    logger::{self, LogTag},
    realtime::{ClientInfo, HubMetricsSnapshot},
    webserver::{
        state::AppState,
        utils::{error_response, success_response},
    },
};

#[derive(Debug, Clone, Serialize)]
pub struct RealtimeStatusResponse {
    pub connected_clients: usize,
    pub timers_running: bool,
    pub listening: bool,
    pub uptime_seconds: u64,
    pub source: &'static str,
    pub computations: u64,
    pub hub: HubMetricsSnapshot,
    pub coordinator: CoordinatorStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientsResponse {
    pub count: usize,
    pub clients: Vec<ClientInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearCacheResponse {
    pub cleared: bool,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(realtime_status))
        .route("/clients", get(list_clients))
        .route("/stats", get(refresh_stats))
        .route("/cache-info", get(cache_info))
        .route("/clear-cache", post(clear_cache))
        .route("/cleanup", post(cleanup))
}

/// GET /api/realtime/status
async fn realtime_status(State(state): State<Arc<AppState>>) -> Response {
    let app = &state.app;
    success_response(RealtimeStatusResponse {
        connected_clients: app.registry.get_connected_clients_count(),
        timers_running: app.registry.timers_running(),
        listening: app.coordinator.is_listening(),
        uptime_seconds: state.uptime_seconds(),
        source: app.aggregator.source_name(),
        computations: app.aggregator.computations(),
        hub: app.registry.metrics(),
        coordinator: app.coordinator.stats(),
    })
}

/// GET /api/realtime/clients
async fn list_clients(State(state): State<Arc<AppState>>) -> Response {
    let clients = state.app.registry.get_client_info();
    success_response(ClientsResponse {
        count: clients.len(),
        clients,
    })
}

/// GET /api/realtime/stats
///
/// Always recomputes; the fresh snapshot also refreshes the cache.
async fn refresh_stats(State(state): State<Arc<AppState>>) -> Response {
    match state.app.aggregator.get_aggregated_stats(true).await {
        Ok(stats) => success_response(stats),
        Err(e) => {
            logger::warning(LogTag::Webserver, &format!("Forced refresh failed: {}", e));
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "SOURCE_UNAVAILABLE",
                &e.to_string(),
            )
        }
    }
}

/// GET /api/realtime/cache-info
async fn cache_info(State(state): State<Arc<AppState>>) -> Response {
    success_response(state.app.aggregator.get_cache_info().await)
}

/// POST /api/realtime/clear-cache
async fn clear_cache(State(state): State<Arc<AppState>>) -> Response {
    state.app.aggregator.clear_cache().await;
    if is_debug_webserver_enabled() {
        logger::debug(LogTag::Webserver, "Snapshot cache cleared via admin API");
    }
    success_response(ClearCacheResponse { cleared: true })
}

/// POST /api/realtime/cleanup
async fn cleanup(State(state): State<Arc<AppState>>) -> Response {
    let registry = &state.app.registry;
    let removed = registry.sweep_stale_connections();
    success_response(CleanupResponse {
        removed,
        remaining: registry.get_connected_clients_count(),
    })
}
