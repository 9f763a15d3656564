/// Connection registry
///
/// Owns every live client connection: its transport handle, subscription set
/// and activity timestamps. All outbound traffic goes through here.
///
/// Delivery policy: a failed write or a transport that is no longer open
/// evicts the connection on the spot. Nothing is retried.
///
/// Two background timers run while the registry is alive:
/// - cleanup sweep: evicts closed or idle connections
/// - keepalive: pushes the current snapshot unless a real update went out
///   recently
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::message::{ResponseType, ServerResponse, SnapshotKind, StatsPayload, Topic};
use super::metrics::{HubMetrics, HubMetricsSnapshot};
use super::transport::{same_transport, ClientTransport, TransportState};
use crate::config::RegistryConfig;
use crate::coordinator::{KeepaliveGate, StatsUpdate, UpdateSink};
use crate::logger::{self, LogTag};
use crate::stats::StatsAggregator;

pub type ClientId = Uuid;

const MIN_TIMER_PERIOD: Duration = Duration::from_secs(1);

struct Connection {
    transport: Arc<dyn ClientTransport>,
    subscriptions: BTreeSet<Topic>,
    connected_at: DateTime<Utc>,
    last_activity: Instant,
    messages_sent: u64,
    messages_received: u64,
}

/// Admin view of one connection
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub state: TransportState,
    pub subscriptions: Vec<Topic>,
    pub connected_at: DateTime<Utc>,
    pub idle_ms: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
}

impl ClientInfo {
    fn from_connection(id: ClientId, conn: &Connection) -> Self {
        Self {
            id,
            state: conn.transport.state(),
            subscriptions: conn.subscriptions.iter().copied().collect(),
            connected_at: conn.connected_at,
            idle_ms: conn.last_activity.elapsed().as_millis() as u64,
            messages_sent: conn.messages_sent,
            messages_received: conn.messages_received,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveOutcome {
    NoClients,
    Suppressed,
    Sent(usize),
    Failed,
}

pub struct ConnectionRegistry {
    config: RegistryConfig,
    clients: RwLock<HashMap<ClientId, Connection>>,
    aggregator: Arc<StatsAggregator>,
    keepalive_gate: Arc<dyn KeepaliveGate>,
    metrics: HubMetrics,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionRegistry {
    /// Registry without background timers
    pub fn new(
        config: RegistryConfig,
        aggregator: Arc<StatsAggregator>,
        keepalive_gate: Arc<dyn KeepaliveGate>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            clients: RwLock::new(HashMap::new()),
            aggregator,
            keepalive_gate,
            metrics: HubMetrics::new(),
            timers: Mutex::new(Vec::new()),
        })
    }

    /// Registry with the cleanup and keepalive timers running
    pub fn spawn(
        config: RegistryConfig,
        aggregator: Arc<StatsAggregator>,
        keepalive_gate: Arc<dyn KeepaliveGate>,
    ) -> Arc<Self> {
        let registry = Self::new(config, aggregator, keepalive_gate);
        registry.start_timers();
        registry
    }

    fn start_timers(self: &Arc<Self>) {
        let cleanup_period = self.config.cleanup_interval().max(MIN_TIMER_PERIOD);
        let keepalive_period = self.config.keepalive_interval().max(MIN_TIMER_PERIOD);

        let cleanup = spawn_periodic(Arc::downgrade(self), cleanup_period, |registry| async move {
            registry.sweep_stale_connections();
        });
        let keepalive =
            spawn_periodic(Arc::downgrade(self), keepalive_period, |registry| async move {
                registry.keepalive().await;
            });

        self.timers.lock().extend([cleanup, keepalive]);

        logger::debug(
            LogTag::Registry,
            &format!(
                "Timers started (cleanup every {}s, keepalive every {}s)",
                cleanup_period.as_secs(),
                keepalive_period.as_secs()
            ),
        );
    }

    // ------------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------------

    pub fn add_client(
        &self,
        transport: Arc<dyn ClientTransport>,
        subscriptions: impl IntoIterator<Item = Topic>,
    ) -> ClientId {
        let id = Uuid::new_v4();
        let connection = Connection {
            transport,
            subscriptions: subscriptions.into_iter().collect(),
            connected_at: Utc::now(),
            last_activity: Instant::now(),
            messages_sent: 0,
            messages_received: 0,
        };

        let active = {
            let mut clients = self.clients.write();
            clients.insert(id, connection);
            clients.len()
        };
        self.metrics.connection_opened();

        logger::info(
            LogTag::Registry,
            &format!("Client {} connected (active={})", id, active),
        );
        id
    }

    /// Remove a connection and close its transport. Returns false if unknown.
    pub fn remove_client(&self, id: ClientId) -> bool {
        let removed = self.clients.write().remove(&id);
        match removed {
            Some(connection) => {
                connection.transport.close();
                self.metrics.connection_closed();
                logger::info(
                    LogTag::Registry,
                    &format!(
                        "Client {} removed (active={})",
                        id,
                        self.get_connected_clients_count()
                    ),
                );
                true
            }
            None => false,
        }
    }

    pub fn get_client(&self, id: ClientId) -> Option<ClientInfo> {
        self.clients
            .read()
            .get(&id)
            .map(|conn| ClientInfo::from_connection(id, conn))
    }

    pub fn find_by_transport(&self, transport: &Arc<dyn ClientTransport>) -> Option<ClientId> {
        self.clients
            .read()
            .iter()
            .find(|(_, conn)| same_transport(&conn.transport, transport))
            .map(|(id, _)| *id)
    }

    /// Record inbound activity (message or pong)
    pub fn touch(&self, id: ClientId, counts_as_message: bool) {
        if let Some(conn) = self.clients.write().get_mut(&id) {
            conn.last_activity = Instant::now();
            if counts_as_message {
                conn.messages_received += 1;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Add topics; returns the new subscription count, None if unknown client
    pub fn subscribe(&self, id: ClientId, topics: &[Topic]) -> Option<usize> {
        let mut clients = self.clients.write();
        let conn = clients.get_mut(&id)?;
        conn.subscriptions.extend(topics.iter().copied());
        Some(conn.subscriptions.len())
    }

    /// Remove topics; returns the new subscription count, None if unknown client
    pub fn unsubscribe(&self, id: ClientId, topics: &[Topic]) -> Option<usize> {
        let mut clients = self.clients.write();
        let conn = clients.get_mut(&id)?;
        for topic in topics {
            conn.subscriptions.remove(topic);
        }
        Some(conn.subscriptions.len())
    }

    pub fn subscriptions(&self, id: ClientId) -> Option<Vec<Topic>> {
        self.clients
            .read()
            .get(&id)
            .map(|conn| conn.subscriptions.iter().copied().collect())
    }

    // ------------------------------------------------------------------------
    // Delivery
    // ------------------------------------------------------------------------

    /// Send one response. False if the client is unknown or was evicted.
    pub async fn send_to_client(&self, id: ClientId, response: &ServerResponse) -> bool {
        match response.to_json() {
            Ok(frame) => self.send_frame(id, frame).await,
            Err(e) => {
                logger::error(
                    LogTag::Registry,
                    &format!("Dropping {:?} response for {}: {}", response.kind, id, e),
                );
                false
            }
        }
    }

    async fn send_frame(&self, id: ClientId, frame: String) -> bool {
        let transport = self.clients.read().get(&id).map(|c| c.transport.clone());
        let Some(transport) = transport else {
            return false;
        };

        if transport.state() != TransportState::Open {
            logger::debug(
                LogTag::Registry,
                &format!("Client {} transport not open, evicting", id),
            );
            self.evict(id);
            return false;
        }

        match transport.send(frame).await {
            Ok(()) => {
                if let Some(conn) = self.clients.write().get_mut(&id) {
                    conn.messages_sent += 1;
                }
                self.metrics.message_sent();
                true
            }
            Err(e) => {
                self.metrics.send_failed();
                logger::warning(
                    LogTag::Registry,
                    &format!("Send to client {} failed ({}), evicting", id, e),
                );
                self.evict(id);
                false
            }
        }
    }

    fn evict(&self, id: ClientId) {
        if self.remove_client(id) {
            self.metrics.evicted(1);
        }
    }

    /// Send to every subscriber of `topic`; returns how many writes succeeded
    pub async fn send_to_subscribers(&self, topic: Topic, response: &ServerResponse) -> usize {
        let frame = match response.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                logger::error(
                    LogTag::Registry,
                    &format!("Dropping {:?} fan-out: {}", response.kind, e),
                );
                return 0;
            }
        };

        let targets: Vec<ClientId> = self
            .clients
            .read()
            .iter()
            .filter(|(_, conn)| conn.subscriptions.contains(&topic))
            .map(|(id, _)| *id)
            .collect();

        let outcomes = join_all(
            targets
                .into_iter()
                .map(|id| self.send_frame(id, frame.clone())),
        )
        .await;

        outcomes.into_iter().filter(|delivered| *delivered).count()
    }

    /// Push a recomputed snapshot to `stats_updates` subscribers
    pub async fn broadcast_update(&self, update: &StatsUpdate) -> usize {
        let response = match ServerResponse::with_payload(ResponseType::Update, update) {
            Ok(response) => response,
            Err(e) => {
                logger::error(LogTag::Registry, &format!("Update not broadcast: {}", e));
                return 0;
            }
        };

        self.metrics.broadcast();
        let reached = self.send_to_subscribers(Topic::StatsUpdates, &response).await;

        logger::debug(
            LogTag::Registry,
            &format!(
                "Update generation {} delivered to {} client(s)",
                update.metadata.generation, reached
            ),
        );
        reached
    }

    // ------------------------------------------------------------------------
    // Sweeps
    // ------------------------------------------------------------------------

    /// Evict connections whose transport is not open or that have been idle
    /// longer than the client timeout. Returns the number evicted.
    pub fn sweep_stale_connections(&self) -> usize {
        let timeout = self.config.client_timeout();

        let stale: Vec<ClientId> = self
            .clients
            .read()
            .iter()
            .filter(|(_, conn)| {
                conn.transport.state() != TransportState::Open
                    || conn.last_activity.elapsed() > timeout
            })
            .map(|(id, _)| *id)
            .collect();

        let mut evicted = 0;
        for id in stale {
            if self.remove_client(id) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            self.metrics.evicted(evicted as u64);
            logger::info(
                LogTag::Registry,
                &format!("Cleanup sweep evicted {} stale connection(s)", evicted),
            );
        }
        evicted
    }

    /// One keepalive round
    pub async fn keepalive(&self) -> KeepaliveOutcome {
        if self.get_connected_clients_count() == 0 {
            return KeepaliveOutcome::NoClients;
        }

        if self.keepalive_gate.should_skip_keepalive() {
            self.metrics.keepalive_skipped();
            logger::debug(LogTag::Registry, "Keepalive skipped, recent update already sent");
            return KeepaliveOutcome::Suppressed;
        }

        let stats = match self.aggregator.get_aggregated_stats(false).await {
            Ok(stats) => stats,
            Err(e) => {
                logger::warning(LogTag::Registry, &format!("Keepalive snapshot unavailable: {}", e));
                return KeepaliveOutcome::Failed;
            }
        };

        let payload = StatsPayload {
            kind: SnapshotKind::Keepalive,
            stats: &stats,
        };
        match ServerResponse::with_payload(ResponseType::Stats, &payload) {
            Ok(response) => {
                let sent = self.send_to_subscribers(Topic::StatsUpdates, &response).await;
                self.metrics.keepalive_sent();
                KeepaliveOutcome::Sent(sent)
            }
            Err(e) => {
                logger::error(LogTag::Registry, &format!("Keepalive not sent: {}", e));
                KeepaliveOutcome::Failed
            }
        }
    }

    // ------------------------------------------------------------------------
    // Shutdown and introspection
    // ------------------------------------------------------------------------

    /// Stop the timers and close every connection
    pub fn cleanup(&self) {
        for handle in self.timers.lock().drain(..) {
            handle.abort();
        }

        let connections: Vec<(ClientId, Connection)> = self.clients.write().drain().collect();
        let closed = connections.len();
        for (_, connection) in connections {
            connection.transport.close();
            self.metrics.connection_closed();
        }

        logger::info(
            LogTag::Registry,
            &format!("Registry stopped, {} connection(s) closed", closed),
        );
    }

    pub fn get_client_info(&self) -> Vec<ClientInfo> {
        let mut infos: Vec<ClientInfo> = self
            .clients
            .read()
            .iter()
            .map(|(id, conn)| ClientInfo::from_connection(*id, conn))
            .collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }

    pub fn get_connected_clients_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn metrics(&self) -> HubMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn timers_running(&self) -> bool {
        !self.timers.lock().is_empty()
    }
}

#[async_trait]
impl UpdateSink for ConnectionRegistry {
    async fn broadcast_update(&self, update: StatsUpdate) -> usize {
        ConnectionRegistry::broadcast_update(self, &update).await
    }
}

/// Run `tick` every `period` until the registry is dropped
fn spawn_periodic<F, Fut>(registry: Weak<ConnectionRegistry>, period: Duration, tick: F) -> JoinHandle<()>
where
    F: Fn(Arc<ConnectionRegistry>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(registry) = registry.upgrade() else {
                break;
            };
            tick(registry).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryPrimaryCache;
    use crate::config::{CoordinatorConfig, StatsCacheConfig};
    use crate::coordinator::{UpdateClock, UpdateMetadata};
    use crate::events::EventTopic;
    use crate::realtime::transport::mock::MockTransport;
    use crate::stats::{AggregateStats, MemoryStatsSource};

    fn aggregator() -> Arc<StatsAggregator> {
        Arc::new(StatsAggregator::new(
            Arc::new(MemoryStatsSource::with_demo_data()),
            Arc::new(MemoryPrimaryCache::new()),
            &StatsCacheConfig::default(),
        ))
    }

    fn registry_with_clock() -> (Arc<ConnectionRegistry>, Arc<UpdateClock>) {
        let clock = Arc::new(UpdateClock::new(
            CoordinatorConfig::default().keepalive_suppress(),
        ));
        let registry = ConnectionRegistry::new(RegistryConfig::default(), aggregator(), clock.clone());
        (registry, clock)
    }

    fn registry() -> Arc<ConnectionRegistry> {
        registry_with_clock().0
    }

    fn update() -> StatsUpdate {
        StatsUpdate {
            stats: AggregateStats::default(),
            metadata: UpdateMetadata {
                trigger: EventTopic::ResultCreated,
                action: "created",
                result_id: "r-1".to_string(),
                operator_id: "op-1".to_string(),
                timestamp: Utc::now(),
                generation: 1,
                attempts: 1,
            },
        }
    }

    #[tokio::test]
    async fn test_add_find_remove() {
        let registry = registry();
        let mock = MockTransport::new();
        let transport: Arc<dyn ClientTransport> = mock.clone();

        let id = registry.add_client(transport.clone(), [Topic::StatsUpdates]);
        assert_eq!(registry.get_connected_clients_count(), 1);
        assert_eq!(registry.find_by_transport(&transport), Some(id));
        assert_eq!(registry.subscriptions(id), Some(vec![Topic::StatsUpdates]));

        assert!(registry.remove_client(id));
        assert!(!registry.remove_client(id));
        assert_eq!(mock.close_calls(), 1);
        assert!(registry.get_client(id).is_none());
        assert_eq!(registry.find_by_transport(&transport), None);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = registry();
        let a = registry.add_client(MockTransport::new(), []);
        let b = registry.add_client(MockTransport::new(), []);
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }

    #[tokio::test]
    async fn test_failed_send_evicts() {
        let registry = registry();
        let mock = MockTransport::new();
        let id = registry.add_client(mock.clone(), [Topic::StatsUpdates]);

        mock.fail_sends();
        assert!(!registry.send_to_client(id, &ServerResponse::error("x")).await);
        assert_eq!(registry.get_connected_clients_count(), 0);
        assert_eq!(registry.metrics().send_failures, 1);
        assert_eq!(registry.metrics().evictions, 1);
    }

    #[tokio::test]
    async fn test_closed_transport_evicted_on_send() {
        let registry = registry();
        let mock = MockTransport::new();
        let id = registry.add_client(mock.clone(), [Topic::StatsUpdates]);

        mock.set_state(TransportState::Closed);
        assert!(!registry.send_to_client(id, &ServerResponse::error("x")).await);
        assert!(registry.get_client(id).is_none());
        assert!(mock.frames().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_reaches_only_subscribers() {
        let registry = registry();
        let subscribed = MockTransport::new();
        let other = MockTransport::new();
        let a = registry.add_client(subscribed.clone(), [Topic::StatsUpdates]);
        let b = registry.add_client(other.clone(), [Topic::StatsUpdates]);
        registry.unsubscribe(b, &[Topic::StatsUpdates]);

        let reached = registry.broadcast_update(&update()).await;
        assert_eq!(reached, 1);

        let frame = subscribed.last_frame().unwrap();
        assert_eq!(frame["type"], "update");
        assert_eq!(frame["data"]["metadata"]["operator_id"], "op-1");
        assert!(other.frames().is_empty());

        assert_eq!(registry.get_client(a).unwrap().messages_sent, 1);
    }

    #[tokio::test]
    async fn test_broadcast_evicts_dead_subscriber() {
        let registry = registry();
        let alive = MockTransport::new();
        let dead = MockTransport::new();
        registry.add_client(alive.clone(), [Topic::StatsUpdates]);
        registry.add_client(dead.clone(), [Topic::StatsUpdates]);
        dead.fail_sends();

        assert_eq!(registry.broadcast_update(&update()).await, 1);
        assert_eq!(registry.get_connected_clients_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_idle_and_closed() {
        let registry = registry();
        let idle = MockTransport::new();
        let closed = MockTransport::new();
        let active = MockTransport::new();
        registry.add_client(idle.clone(), []);
        registry.add_client(closed.clone(), []);
        let active_id = registry.add_client(active.clone(), []);

        closed.set_state(TransportState::Closed);
        tokio::time::advance(Duration::from_secs(100)).await;
        registry.touch(active_id, true);
        assert_eq!(registry.sweep_stale_connections(), 1);

        tokio::time::advance(Duration::from_secs(21)).await;
        assert_eq!(registry.sweep_stale_connections(), 1);
        assert_eq!(registry.get_connected_clients_count(), 1);
        assert!(registry.get_client(active_id).is_some());
        assert_eq!(registry.get_client(active_id).unwrap().messages_received, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_outcomes() {
        let (registry, clock) = registry_with_clock();
        assert_eq!(registry.keepalive().await, KeepaliveOutcome::NoClients);

        let mock = MockTransport::new();
        registry.add_client(mock.clone(), [Topic::StatsUpdates]);

        clock.mark();
        assert_eq!(registry.keepalive().await, KeepaliveOutcome::Suppressed);
        assert!(mock.frames().is_empty());

        tokio::time::advance(Duration::from_millis(2500)).await;
        assert_eq!(registry.keepalive().await, KeepaliveOutcome::Sent(1));

        let frame = mock.last_frame().unwrap();
        assert_eq!(frame["type"], "stats");
        assert_eq!(frame["data"]["type"], "keepalive");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_push_keepalive_until_cleanup() {
        let clock = Arc::new(UpdateClock::new(Duration::from_millis(2000)));
        let registry = ConnectionRegistry::spawn(RegistryConfig::default(), aggregator(), clock);
        let mock = MockTransport::new();
        let id = registry.add_client(mock.clone(), [Topic::StatsUpdates]);
        assert!(registry.timers_running());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(mock.frames().len(), 1);
        // Still active: the sweep only drops idle clients after 120s
        assert!(registry.get_client(id).is_some());

        registry.cleanup();
        assert!(!registry.timers_running());
        assert_eq!(registry.get_connected_clients_count(), 0);
        assert_eq!(mock.close_calls(), 1);
    }
}
