/// Application composition
///
/// Builds every long-lived component once and wires them together:
///
/// ```text
/// EventBus --> UpdateCoordinator --> StatsAggregator --> TieredCache
///                     |                     ^
///                     v                     |
///              ConnectionRegistry <--- ProtocolHandler <--- sockets
/// ```
///
/// The registry reads the coordinator's `UpdateClock` (not the coordinator
/// itself) to decide whether a keepalive is redundant.
use std::sync::Arc;

use crate::cache::{MemoryPrimaryCache, PrimaryCache};
use crate::config::{Config, SourceConfig, StatsCacheConfig};
use crate::coordinator::{UpdateClock, UpdateCoordinator};
use crate::errors::{SourceError, StatsHubError};
use crate::events::EventBus;
use crate::logger::{self, LogTag};
use crate::realtime::{ConnectionRegistry, ProtocolHandler};
use crate::stats::{HttpStatsSource, MemoryStatsSource, StatsAggregator, StatsSource};

pub struct App {
    pub config: Config,
    pub bus: Arc<EventBus>,
    pub aggregator: Arc<StatsAggregator>,
    pub clock: Arc<UpdateClock>,
    pub registry: Arc<ConnectionRegistry>,
    pub coordinator: Arc<UpdateCoordinator>,
    pub protocol: Arc<ProtocolHandler>,
}

impl App {
    /// Build from configuration. `seed_demo` fills the in-memory source.
    pub async fn build(config: Config, seed_demo: bool) -> Result<Self, StatsHubError> {
        let source = build_source(&config.source, seed_demo)?;
        let primary = build_primary(&config.cache).await;
        Ok(Self::from_parts(config, source, primary))
    }

    /// Wire already constructed source and primary cache tier.
    /// Must run inside a tokio runtime: the registry timers start here.
    pub fn from_parts(
        config: Config,
        source: Arc<dyn StatsSource>,
        primary: Arc<dyn PrimaryCache>,
    ) -> Self {
        let bus = EventBus::new();
        let aggregator = Arc::new(StatsAggregator::new(source, primary, &config.cache));
        let clock = Arc::new(UpdateClock::new(config.coordinator.keepalive_suppress()));

        let registry = ConnectionRegistry::spawn(
            config.registry.clone(),
            aggregator.clone(),
            clock.clone(),
        );
        let coordinator = UpdateCoordinator::new(
            config.coordinator.clone(),
            bus.clone(),
            aggregator.clone(),
            registry.clone(),
            clock.clone(),
        );
        coordinator.start();

        let protocol = Arc::new(ProtocolHandler::new(registry.clone(), aggregator.clone()));

        logger::info(
            LogTag::System,
            &format!(
                "Statistics pipeline ready (source: {}, cache key: {})",
                aggregator.source_name(),
                config.cache.key
            ),
        );

        Self {
            config,
            bus,
            aggregator,
            clock,
            registry,
            coordinator,
            protocol,
        }
    }

    /// Stop listening for events and close every connection
    pub fn shutdown(&self) {
        self.coordinator.cleanup();
        self.registry.cleanup();
        logger::info(LogTag::System, "Statistics pipeline stopped");
    }
}

fn build_source(
    config: &SourceConfig,
    seed_demo: bool,
) -> Result<Arc<dyn StatsSource>, SourceError> {
    match config.kind.as_str() {
        "memory" => {
            let source = if seed_demo {
                MemoryStatsSource::with_demo_data()
            } else {
                MemoryStatsSource::new()
            };
            Ok(Arc::new(source))
        }
        "http" => Ok(Arc::new(HttpStatsSource::new(config)?)),
        other => Err(SourceError::Config(format!(
            "unknown source kind '{}' (expected memory or http)",
            other
        ))),
    }
}

/// Redis when configured and reachable, in-process otherwise
async fn build_primary(config: &StatsCacheConfig) -> Arc<dyn PrimaryCache> {
    #[cfg(feature = "redis")]
    {
        if let Some(url) = config.redis_url.as_deref() {
            match crate::cache::RedisPrimaryCache::connect(url).await {
                Ok(redis) => return Arc::new(redis),
                Err(e) => logger::warning(
                    LogTag::Cache,
                    &format!("Redis unavailable ({}), using in-process primary cache", e),
                ),
            }
        }
    }

    #[cfg(not(feature = "redis"))]
    {
        if config.redis_url.is_some() {
            logger::warning(
                LogTag::Cache,
                "redis_url set but the redis feature is disabled, using in-process primary cache",
            );
        }
    }

    Arc::new(MemoryPrimaryCache::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DomainEvent;
    use crate::events::EventTopic;
    use crate::realtime::transport::mock::MockTransport;
    use std::time::Duration;

    fn demo_app() -> App {
        App::from_parts(
            Config::default(),
            Arc::new(MemoryStatsSource::with_demo_data()),
            Arc::new(MemoryPrimaryCache::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_reaches_subscribed_client() {
        let app = demo_app();
        let mock = MockTransport::new();
        app.protocol.handle_connect(mock.clone()).await;

        app.bus
            .emit(EventTopic::ResultCreated, DomainEvent::created("r-new", "op-2"))
            .await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        let frame = mock.last_frame().unwrap();
        assert_eq!(frame["type"], "update");
        assert_eq!(frame["data"]["metadata"]["action"], "created");
        assert_eq!(frame["data"]["metadata"]["operator_id"], "op-2");

        app.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections() {
        let app = demo_app();
        let mock = MockTransport::new();
        app.protocol.handle_connect(mock.clone()).await;

        app.shutdown();
        assert_eq!(app.registry.get_connected_clients_count(), 0);
        assert_eq!(mock.close_calls(), 1);
        assert!(!app.coordinator.is_listening());
        assert!(!app.registry.timers_running());
    }

    #[tokio::test]
    async fn test_build_rejects_unknown_source() {
        let mut config = Config::default();
        config.source.kind = "carrier-pigeon".to_string();
        assert!(matches!(
            App::build(config, false).await,
            Err(StatsHubError::Source(SourceError::Config(_)))
        ));
    }

    #[tokio::test]
    async fn test_build_memory_source() {
        let app = App::build(Config::default(), true).await.unwrap();
        let stats = app.aggregator.get_aggregated_stats(false).await.unwrap();
        assert!(stats.has_data());
        app.shutdown();
    }
}
