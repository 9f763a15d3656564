/// Client protocol handler
///
/// Connection lifecycle (connect -> messages -> disconnect) on top of the
/// registry. Messages only ever change a connection's subscription set;
/// invalid input is answered with an `error` response and the connection
/// stays open.
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::message::{
    ClientMessage, ResponseType, ServerResponse, SnapshotKind, StatsPayload, Topic,
    DEFAULT_TOP_OPERATORS_LIMIT, DEFAULT_TOP_PRODUCTS_LIMIT,
};
use super::registry::{ClientId, ConnectionRegistry};
use super::transport::ClientTransport;
use super::validator;
use crate::errors::SourceError;
use crate::logger::{self, LogTag};
use crate::stats::StatsAggregator;

/// Subscriptions every new connection starts with
pub const DEFAULT_SUBSCRIPTIONS: [Topic; 1] = [Topic::StatsUpdates];

pub struct ProtocolHandler {
    registry: Arc<ConnectionRegistry>,
    aggregator: Arc<StatsAggregator>,
}

impl ProtocolHandler {
    pub fn new(registry: Arc<ConnectionRegistry>, aggregator: Arc<StatsAggregator>) -> Self {
        Self {
            registry,
            aggregator,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Register the connection and send the initial snapshot
    pub async fn handle_connect(&self, transport: Arc<dyn ClientTransport>) -> ClientId {
        let id = self.registry.add_client(transport, DEFAULT_SUBSCRIPTIONS);

        let response = match self.aggregator.get_aggregated_stats(false).await {
            Ok(stats) => stats_response(SnapshotKind::Initial, &stats),
            Err(e) => {
                logger::warning(
                    LogTag::Protocol,
                    &format!("Initial snapshot for {} unavailable: {}", id, e),
                );
                ServerResponse::error("Statistics are temporarily unavailable")
            }
        };
        self.registry.send_to_client(id, &response).await;

        id
    }

    /// Validate and dispatch one inbound text frame
    pub async fn handle_message(&self, id: ClientId, text: &str) {
        self.registry.touch(id, true);

        match validator::parse_message(text) {
            Ok(message) => {
                logger::verbose(LogTag::Protocol, &format!("{} -> {:?}", id, message));
                let response = self.dispatch(id, message).await;
                if let Some(response) = response {
                    self.registry.send_to_client(id, &response).await;
                }
            }
            Err(e) => {
                logger::debug(
                    LogTag::Protocol,
                    &format!("Rejected message from {}: {}", id, e),
                );
                self.registry
                    .send_to_client(id, &ServerResponse::error(e.to_string()))
                    .await;
            }
        }
    }

    /// Liveness signal without a message (pong)
    pub fn handle_pong(&self, id: ClientId) {
        self.registry.touch(id, false);
    }

    pub fn handle_disconnect(&self, id: ClientId) {
        if self.registry.remove_client(id) {
            logger::debug(LogTag::Protocol, &format!("Client {} disconnected", id));
        }
    }

    /// Response for a message, None if the client vanished meanwhile
    async fn dispatch(&self, id: ClientId, message: ClientMessage) -> Option<ServerResponse> {
        let response = match message {
            ClientMessage::Subscribe { events } => {
                let topics = known_topics(&events);
                let total = self.registry.subscribe(id, &topics)?;
                payload_response(
                    ResponseType::Subscribed,
                    &json!({ "subscribed_events": topics, "total_subscriptions": total }),
                )
            }
            ClientMessage::Unsubscribe { events } => {
                let topics = known_topics(&events);
                let total = self.registry.unsubscribe(id, &topics)?;
                payload_response(
                    ResponseType::Unsubscribed,
                    &json!({ "unsubscribed_events": topics, "total_subscriptions": total }),
                )
            }
            ClientMessage::GetStats { force_refresh } => {
                match self.aggregator.get_aggregated_stats(force_refresh).await {
                    Ok(stats) => stats_response(SnapshotKind::Requested, &stats),
                    Err(e) => source_failure("statistics", e),
                }
            }
            ClientMessage::GetTopOperators { limit } => {
                let limit = limit.unwrap_or(DEFAULT_TOP_OPERATORS_LIMIT);
                match self.aggregator.get_top_operators(limit).await {
                    Ok(operators) => payload_response(ResponseType::TopOperators, &operators),
                    Err(e) => source_failure("top operators", e),
                }
            }
            ClientMessage::GetTopProducts { limit } => {
                let limit = limit.unwrap_or(DEFAULT_TOP_PRODUCTS_LIMIT);
                match self.aggregator.get_top_products(limit).await {
                    Ok(products) => payload_response(ResponseType::TopProducts, &products),
                    Err(e) => source_failure("top products", e),
                }
            }
            ClientMessage::GetGlobalStats => match self.aggregator.get_global_stats().await {
                Ok(global) => payload_response(ResponseType::GlobalStats, &global),
                Err(e) => source_failure("global statistics", e),
            },
        };
        Some(response)
    }
}

/// Requested topic names that exist, in request order, without duplicates
fn known_topics(events: &[String]) -> Vec<Topic> {
    let mut topics = Vec::new();
    for topic in events.iter().filter_map(|e| Topic::from_code(e)) {
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }
    topics
}

fn stats_response(kind: SnapshotKind, stats: &crate::stats::AggregateStats) -> ServerResponse {
    payload_response(ResponseType::Stats, &StatsPayload { kind, stats })
}

fn payload_response<T: Serialize>(kind: ResponseType, payload: &T) -> ServerResponse {
    ServerResponse::with_payload(kind, payload)
        .unwrap_or_else(|e| ServerResponse::error(format!("Failed to encode response: {}", e)))
}

fn source_failure(what: &str, error: SourceError) -> ServerResponse {
    logger::warning(LogTag::Protocol, &format!("Failed to load {}: {}", what, error));
    ServerResponse::error(format!("Failed to load {}", what))
}
