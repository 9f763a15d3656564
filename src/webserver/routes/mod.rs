use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::webserver::state::AppState;

pub mod events;
pub mod realtime;
pub mod status;
pub mod ws;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors_permissive = state.config.cors_permissive;

    let router = Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api_routes())
        .with_state(state);

    if cors_permissive {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(events::routes())
        .nest("/realtime", realtime::routes())
}
