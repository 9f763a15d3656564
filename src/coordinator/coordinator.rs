/// Update coordinator
///
/// Turns bursts of result mutations into one recomputed snapshot pushed to
/// subscribers:
///
/// event -> debounce (trailing edge) -> invalidate cache -> consistency
/// delay -> fetch with retry/backoff -> generation check -> fan-out
///
/// Each debounce firing gets a generation number. A result is only fanned
/// out if no newer generation has been broadcast already, so overlapping
/// windows can never push an older snapshot over a newer one.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::clock::{KeepaliveGate, UpdateClock};
use super::debounce::{DebouncedAction, Debouncer};
use crate::config::CoordinatorConfig;
use crate::events::{DomainEvent, EventBus, EventTopic, HandlerId};
use crate::logger::{self, LogTag};
use crate::stats::{AggregateStats, StatsAggregator};

// ============================================================================
// FAN-OUT CONTRACT
// ============================================================================

/// Metadata of the event that closed a debounce window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateMetadata {
    pub trigger: EventTopic,
    pub action: &'static str,
    pub result_id: String,
    pub operator_id: String,
    /// When the triggering event happened
    pub timestamp: DateTime<Utc>,
    pub generation: u64,
    pub attempts: u32,
}

/// A recomputed snapshot ready for fan-out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsUpdate {
    pub stats: AggregateStats,
    pub metadata: UpdateMetadata,
}

/// Receives recomputed snapshots
#[async_trait]
pub trait UpdateSink: Send + Sync {
    /// Returns how many connections the update reached
    async fn broadcast_update(&self, update: StatsUpdate) -> usize;
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
struct Counters {
    events_received: AtomicU64,
    windows_fired: AtomicU64,
    broadcasts: AtomicU64,
    stale_discarded: AtomicU64,
    failed_windows: AtomicU64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorStats {
    pub events_received: u64,
    pub windows_fired: u64,
    pub broadcasts: u64,
    pub stale_discarded: u64,
    pub failed_windows: u64,
    pub last_generation: u64,
    pub debounce_pending: bool,
    pub ms_since_last_update: Option<u64>,
}

// ============================================================================
// COORDINATOR
// ============================================================================

pub struct UpdateCoordinator {
    config: CoordinatorConfig,
    bus: Arc<EventBus>,
    aggregator: Arc<StatsAggregator>,
    sink: Arc<dyn UpdateSink>,
    clock: Arc<UpdateClock>,
    debouncer: Debouncer<DomainEvent>,
    subscriptions: Mutex<Vec<(EventTopic, HandlerId)>>,
    generation: AtomicU64,
    /// Highest generation fanned out so far; held across the broadcast
    last_broadcast: tokio::sync::Mutex<u64>,
    counters: Counters,
}

impl UpdateCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        bus: Arc<EventBus>,
        aggregator: Arc<StatsAggregator>,
        sink: Arc<dyn UpdateSink>,
        clock: Arc<UpdateClock>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let weak = weak.clone();
            let action: DebouncedAction<DomainEvent> = Arc::new(move |event| {
                let weak = weak.clone();
                async move {
                    if let Some(coordinator) = weak.upgrade() {
                        coordinator.run_window(event).await;
                    }
                }
                .boxed()
            });

            Self {
                debouncer: Debouncer::new(config.debounce(), action),
                config,
                bus,
                aggregator,
                sink,
                clock,
                subscriptions: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
                last_broadcast: tokio::sync::Mutex::new(0),
                counters: Counters::default(),
            }
        })
    }

    /// Subscribe to all result mutation topics. Calling twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.is_empty() {
            return;
        }

        for topic in EventTopic::ALL {
            let weak = Arc::downgrade(self);
            let id = self.bus.on(topic, move |event: DomainEvent| {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(coordinator) => {
                            coordinator.on_event(event);
                            Ok(())
                        }
                        None => Err("update coordinator dropped".to_string()),
                    }
                }
            });
            subscriptions.push((topic, id));
        }

        logger::info(
            LogTag::Coordinator,
            &format!(
                "Update coordinator listening (debounce {}ms, consistency delay {}ms)",
                self.config.debounce_ms, self.config.consistency_delay_ms
            ),
        );
    }

    /// Unsubscribe from the bus and drop any pending debounce firing
    pub fn cleanup(&self) {
        let subscriptions: Vec<_> = self.subscriptions.lock().drain(..).collect();
        for (topic, id) in subscriptions {
            self.bus.off(topic, Some(id));
        }
        if self.debouncer.cancel() {
            logger::debug(LogTag::Coordinator, "Pending update window cancelled");
        }
        logger::info(LogTag::Coordinator, "Update coordinator stopped");
    }

    fn on_event(&self, event: DomainEvent) {
        self.counters.events_received.fetch_add(1, Ordering::Relaxed);
        logger::debug(
            LogTag::Coordinator,
            &format!(
                "{} for result {} (operator {}), debounce restarted",
                event.topic(),
                event.result_id,
                event.operator_id
            ),
        );
        self.debouncer.trigger(event);
    }

    /// One debounce firing: recompute and fan out
    async fn run_window(&self, event: DomainEvent) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.windows_fired.fetch_add(1, Ordering::Relaxed);
        self.clock.mark();

        self.aggregator.clear_cache().await;
        tokio::time::sleep(self.config.consistency_delay()).await;

        let Some((stats, attempts)) = self.fetch_with_retry(generation).await else {
            self.counters.failed_windows.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let update = StatsUpdate {
            stats,
            metadata: UpdateMetadata {
                trigger: event.topic(),
                action: event.kind.action(),
                result_id: event.result_id,
                operator_id: event.operator_id,
                timestamp: event.timestamp,
                generation,
                attempts,
            },
        };

        let mut last_broadcast = self.last_broadcast.lock().await;
        if *last_broadcast > generation {
            self.counters.stale_discarded.fetch_add(1, Ordering::Relaxed);
            logger::debug(
                LogTag::Coordinator,
                &format!(
                    "Discarding generation {} (generation {} already broadcast)",
                    generation, *last_broadcast
                ),
            );
            return;
        }

        let reached = self.sink.broadcast_update(update).await;
        *last_broadcast = generation;
        drop(last_broadcast);

        self.clock.mark();
        self.counters.broadcasts.fetch_add(1, Ordering::Relaxed);
        logger::info(
            LogTag::Coordinator,
            &format!("Broadcast generation {} to {} client(s)", generation, reached),
        );
    }

    /// First snapshot with data wins; if none has data the last one is used.
    /// An error on the final attempt abandons the window.
    async fn fetch_with_retry(&self, generation: u64) -> Option<(AggregateStats, u32)> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_empty = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.backoff(attempt - 1)).await;
            }

            match self.aggregator.get_aggregated_stats(true).await {
                Ok(stats) if stats.has_data() => return Some((stats, attempt)),
                Ok(stats) => {
                    logger::debug(
                        LogTag::Coordinator,
                        &format!(
                            "Generation {} attempt {}/{} returned an empty snapshot",
                            generation, attempt, max_attempts
                        ),
                    );
                    last_empty = Some(stats);
                }
                Err(e) if attempt == max_attempts => {
                    logger::error(
                        LogTag::Coordinator,
                        &format!(
                            "Generation {} failed after {} attempts: {}",
                            generation, attempt, e
                        ),
                    );
                    return None;
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Coordinator,
                        &format!(
                            "Generation {} attempt {}/{} failed: {}",
                            generation, attempt, max_attempts, e
                        ),
                    );
                }
            }
        }

        last_empty.map(|stats| (stats, max_attempts))
    }

    pub fn should_skip_keepalive(&self) -> bool {
        self.clock.should_skip_keepalive()
    }

    pub fn is_listening(&self) -> bool {
        !self.subscriptions.lock().is_empty()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            events_received: self.counters.events_received.load(Ordering::Relaxed),
            windows_fired: self.counters.windows_fired.load(Ordering::Relaxed),
            broadcasts: self.counters.broadcasts.load(Ordering::Relaxed),
            stale_discarded: self.counters.stale_discarded.load(Ordering::Relaxed),
            failed_windows: self.counters.failed_windows.load(Ordering::Relaxed),
            last_generation: self.generation.load(Ordering::SeqCst),
            debounce_pending: self.debouncer.is_pending(),
            ms_since_last_update: self
                .clock
                .since_last_update()
                .map(|d| d.as_millis() as u64),
        }
    }
}

impl KeepaliveGate for UpdateCoordinator {
    fn should_skip_keepalive(&self) -> bool {
        UpdateCoordinator::should_skip_keepalive(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryPrimaryCache;
    use crate::config::StatsCacheConfig;
    use crate::stats::{MemoryStatsSource, StatsSource};
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<StatsUpdate>>,
    }

    #[async_trait]
    impl UpdateSink for RecordingSink {
        async fn broadcast_update(&self, update: StatsUpdate) -> usize {
            self.updates.lock().push(update);
            1
        }
    }

    struct Harness {
        bus: Arc<EventBus>,
        source: Arc<MemoryStatsSource>,
        sink: Arc<RecordingSink>,
        coordinator: Arc<UpdateCoordinator>,
    }

    fn harness(source: MemoryStatsSource) -> Harness {
        let bus = EventBus::new();
        let source = Arc::new(source);
        let aggregator = Arc::new(StatsAggregator::new(
            source.clone() as Arc<dyn StatsSource>,
            Arc::new(MemoryPrimaryCache::new()),
            &StatsCacheConfig::default(),
        ));
        let sink = Arc::new(RecordingSink::default());
        let config = CoordinatorConfig::default();
        let clock = Arc::new(UpdateClock::new(config.keepalive_suppress()));
        let coordinator = UpdateCoordinator::new(
            config,
            bus.clone(),
            aggregator,
            sink.clone(),
            clock,
        );
        coordinator.start();
        Harness {
            bus,
            source,
            sink,
            coordinator,
        }
    }

    async fn emit(bus: &EventBus, event: DomainEvent) {
        bus.emit(event.topic(), event).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_events_collapse_into_one_update() {
        let h = harness(MemoryStatsSource::with_demo_data());

        emit(&h.bus, DomainEvent::created("r-100", "op-1")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        emit(&h.bus, DomainEvent::updated("r-101", "op-2")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        emit(&h.bus, DomainEvent::deleted("r-102", "op-3")).await;

        // 1000ms debounce + 500ms consistency delay, plus slack
        tokio::time::sleep(Duration::from_millis(1600)).await;

        let updates = h.sink.updates.lock().clone();
        assert_eq!(updates.len(), 1);
        let metadata = &updates[0].metadata;
        assert_eq!(metadata.operator_id, "op-3");
        assert_eq!(metadata.result_id, "r-102");
        assert_eq!(metadata.action, "deleted");
        assert_eq!(metadata.trigger, EventTopic::ResultDeleted);
        assert_eq!(metadata.attempts, 1);
        assert!(updates[0].stats.has_data());

        let stats = h.coordinator.stats();
        assert_eq!(stats.events_received, 3);
        assert_eq!(stats.windows_fired, 1);
        assert_eq!(stats.broadcasts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_suppressed_after_update() {
        let h = harness(MemoryStatsSource::with_demo_data());
        assert!(!h.coordinator.should_skip_keepalive());

        emit(&h.bus, DomainEvent::created("r-100", "op-1")).await;
        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(h.sink.updates.lock().len(), 1);
        assert!(h.coordinator.should_skip_keepalive());

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(!h.coordinator.should_skip_keepalive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_snapshots_retried_then_used() {
        let h = harness(MemoryStatsSource::new());

        emit(&h.bus, DomainEvent::created("r-1", "op-1")).await;
        // debounce 1000 + delay 500 + backoff 200 + 400
        tokio::time::sleep(Duration::from_millis(2200)).await;

        let updates = h.sink.updates.lock().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].metadata.attempts, 3);
        assert!(!updates[0].stats.has_data());
        assert_eq!(h.source.fetch_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_attempt_error_skips_broadcast() {
        let h = harness(MemoryStatsSource::with_demo_data());
        h.source.set_failing(true);

        emit(&h.bus, DomainEvent::updated("r-1", "op-1")).await;
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(h.sink.updates.lock().is_empty());
        assert_eq!(h.coordinator.stats().failed_windows, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_unsubscribes_and_cancels() {
        let h = harness(MemoryStatsSource::with_demo_data());
        assert!(h.coordinator.is_listening());
        assert_eq!(h.bus.handler_count(EventTopic::ResultCreated), 1);

        emit(&h.bus, DomainEvent::created("r-1", "op-1")).await;
        h.coordinator.cleanup();

        assert!(!h.coordinator.is_listening());
        assert_eq!(h.bus.handler_count(EventTopic::ResultCreated), 0);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert!(h.sink.updates.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_broadcast_in_order() {
        let h = harness(MemoryStatsSource::with_demo_data());

        emit(&h.bus, DomainEvent::created("r-1", "op-1")).await;
        tokio::time::sleep(Duration::from_millis(1100)).await;
        // First window is now inside its consistency delay
        emit(&h.bus, DomainEvent::created("r-2", "op-2")).await;
        tokio::time::sleep(Duration::from_millis(2000)).await;

        let updates = h.sink.updates.lock().clone();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].metadata.generation, 1);
        assert_eq!(updates[1].metadata.generation, 2);
        assert_eq!(updates[1].metadata.operator_id, "op-2");
    }
}
