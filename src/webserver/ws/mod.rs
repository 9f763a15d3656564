/// WebSocket socket handling
///
/// Bridges one axum `WebSocket` to the transport-agnostic realtime core.
pub mod connection;

pub use connection::handle_connection;
