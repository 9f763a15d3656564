/// Axum webserver lifecycle
///
/// Binds the configured address, serves until `shutdown()` is called, then
/// drains in-flight requests.
use once_cell::sync::Lazy;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::{
    logger::{self, LogTag},
    webserver::{routes, state::AppState},
};

static SHUTDOWN_NOTIFY: Lazy<Arc<Notify>> = Lazy::new(|| Arc::new(Notify::new()));

/// Serve HTTP and websocket traffic until `shutdown()` fires
pub async fn start_server(state: Arc<AppState>) -> Result<(), String> {
    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .map_err(|e| format!("Invalid bind address: {}", e))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| describe_bind_error(addr, &e))?;

    logger::info(
        LogTag::Webserver,
        &format!("Listening on http://{} (websocket: ws://{}/ws)", addr, addr),
    );

    let router = routes::create_router(state);
    let shutdown_signal = async {
        SHUTDOWN_NOTIFY.notified().await;
        logger::debug(LogTag::Webserver, "Shutdown signal received, draining requests");
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    logger::info(LogTag::Webserver, "Webserver stopped");
    Ok(())
}

/// Stop a running `start_server`
///
/// A stored permit covers the case where shutdown races ahead of the bind.
pub fn shutdown() {
    SHUTDOWN_NOTIFY.notify_one();
}

fn describe_bind_error(addr: SocketAddr, e: &io::Error) -> String {
    let hint = match e.kind() {
        io::ErrorKind::AddrInUse => {
            "Address already in use. Another statshub instance may own this port; \
             pick a different one with --port <port> or in the config file."
        }
        io::ErrorKind::PermissionDenied => {
            "Permission denied. Ports below 1024 usually need elevated privileges."
        }
        _ => return format!("Failed to bind to {}: {}", addr, e),
    };
    format!("Failed to bind to {}: {}", addr, hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_hints() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let in_use = io::Error::from(io::ErrorKind::AddrInUse);
        assert!(describe_bind_error(addr, &in_use).contains("--port"));

        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(
            describe_bind_error(addr, &other),
            "Failed to bind to 127.0.0.1:8080: boom"
        );
    }
}
