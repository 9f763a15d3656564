/// HTTP + WebSocket server
///
/// Thin axum layer over the realtime core:
/// - `GET /ws` upgrades to the statistics protocol
/// - `/api/realtime/*` admin endpoints
/// - `POST /api/events` result mutation ingestion
/// - `GET /api/health`
pub mod routes;
pub mod server;
pub mod state;
pub mod utils;
pub mod ws;

pub use server::{shutdown, start_server};
pub use state::AppState;
