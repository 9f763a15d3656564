/// WebSocket connection handler
///
/// One task per socket:
/// - registers a `ChannelTransport` with the protocol handler
/// - drains the transport queue into the socket
/// - feeds inbound text frames to the protocol handler
/// - pings periodically so quiet but live clients are not swept as idle
/// - unregisters on close, error, or registry-initiated close
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::{
    arguments::is_debug_webserver_enabled,
    config::RegistryConfig,
    logger::{self, LogTag},
    realtime::ChannelTransport,
    webserver::state::AppState,
};

const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Ping often enough that at least a few pongs land inside one idle timeout
pub fn ping_interval(config: &RegistryConfig) -> Duration {
    (config.client_timeout() / 4).max(MIN_PING_INTERVAL)
}

/// Handle a WebSocket connection until either side closes it
pub async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let protocol = state.app.protocol.clone();
    let (transport, mut outbound) = ChannelTransport::new(state.send_buffer());
    let (mut ws_tx, mut ws_rx) = socket.split();

    let client_id = protocol.handle_connect(transport.clone()).await;

    let period = ping_interval(&state.app.config.registry);
    let mut ping = interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            // Registry closed us (eviction or shutdown)
            _ = outbound.close_signal.notified() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                if is_debug_webserver_enabled() {
                    logger::debug(
                        LogTag::Webserver,
                        &format!("Connection {}: closed by registry", client_id),
                    );
                }
                break;
            }

            frame = outbound.frames.recv() => {
                let Some(text) = frame else { break };
                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    logger::warning(
                        LogTag::Webserver,
                        &format!("Connection {}: failed to send frame: {}", client_id, e),
                    );
                    break;
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        protocol.handle_message(client_id, &text).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                        protocol.handle_pong(client_id);
                    }
                    Some(Ok(Message::Binary(_))) => {
                        logger::debug(
                            LogTag::Webserver,
                            &format!("Connection {}: ignoring binary frame", client_id),
                        );
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        if is_debug_webserver_enabled() {
                            logger::debug(
                                LogTag::Webserver,
                                &format!("Connection {}: client closed", client_id),
                            );
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        logger::warning(
                            LogTag::Webserver,
                            &format!("Connection {}: websocket error: {}", client_id, e),
                        );
                        break;
                    }
                }
            }

            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    transport.mark_closed();
    protocol.handle_disconnect(client_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_interval() {
        let mut config = RegistryConfig::default();
        assert_eq!(ping_interval(&config), Duration::from_secs(30));

        config.client_timeout_secs = 2;
        assert_eq!(ping_interval(&config), MIN_PING_INTERVAL);
    }
}
