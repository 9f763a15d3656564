/// Configuration schemas - all config sections defined once with defaults
///
/// Each section is declared with `config_struct!`, which provides the
/// embedded defaults and serde support. Duration accessors live next to the
/// sections so callers never deal with raw millisecond/second integers.
use crate::config_struct;
use std::time::Duration;

// ============================================================================
// WEBSERVER CONFIGURATION
// ============================================================================

config_struct! {
    /// HTTP + WebSocket server configuration
    pub struct WebserverConfig {
        /// Host/IP address to bind
        host: String = "127.0.0.1".to_string(),

        /// Port to bind
        port: u16 = 8080,

        /// Allow cross-origin requests from any origin
        cors_permissive: bool = true,
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

config_struct! {
    /// Aggregate statistics cache configuration
    pub struct StatsCacheConfig {
        /// Time-to-live of the aggregate snapshot (seconds)
        ttl_secs: u64 = 300,

        /// Key of the snapshot in the primary cache
        key: String = "statistics:aggregated".to_string(),

        /// Redis URL for the shared primary tier (None = in-process primary)
        redis_url: Option<String> = None,

        /// Capacity of the local fallback tier
        fallback_capacity: usize = 4,
    }
}

impl StatsCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ============================================================================
// RAW DATA SOURCE CONFIGURATION
// ============================================================================

config_struct! {
    /// Where operator and result records are read from
    pub struct SourceConfig {
        /// "memory" or "http"
        kind: String = "memory".to_string(),

        /// Base URL of the records API (http kind only)
        base_url: String = "http://127.0.0.1:3000/api/".to_string(),

        /// Per-request timeout (seconds)
        request_timeout_secs: u64 = 10,
    }
}

// ============================================================================
// UPDATE COORDINATOR CONFIGURATION
// ============================================================================

config_struct! {
    /// Debounce, consistency window and retry policy for recomputation
    pub struct CoordinatorConfig {
        /// Trailing-edge debounce window (ms)
        debounce_ms: u64 = 1000,

        /// Delay between cache invalidation and the first fetch (ms)
        consistency_delay_ms: u64 = 500,

        /// Fetch attempts per burst
        max_attempts: u32 = 3,

        /// Backoff step; attempt N waits N * step (ms)
        backoff_step_ms: u64 = 200,

        /// Keepalive pushes are skipped this long after a real update (ms)
        keepalive_suppress_ms: u64 = 2000,
    }
}

impl CoordinatorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn consistency_delay(&self) -> Duration {
        Duration::from_millis(self.consistency_delay_ms)
    }

    /// Wait before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms * u64::from(attempt))
    }

    pub fn keepalive_suppress(&self) -> Duration {
        Duration::from_millis(self.keepalive_suppress_ms)
    }
}

// ============================================================================
// CONNECTION REGISTRY CONFIGURATION
// ============================================================================

config_struct! {
    /// Connection liveness sweeps and keepalive
    pub struct RegistryConfig {
        /// Interval of the stale-connection sweep (seconds)
        cleanup_interval_secs: u64 = 30,

        /// Interval of the keepalive push (seconds)
        keepalive_interval_secs: u64 = 30,

        /// Connections idle longer than this are evicted (seconds)
        client_timeout_secs: u64 = 120,

        /// Per-connection outbound queue size
        send_buffer: usize = 64,
    }
}

impl RegistryConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

// ============================================================================
// ROOT CONFIGURATION
// ============================================================================

config_struct! {
    /// Root configuration
    pub struct Config {
        webserver: WebserverConfig = WebserverConfig::default(),
        cache: StatsCacheConfig = StatsCacheConfig::default(),
        source: SourceConfig = SourceConfig::default(),
        coordinator: CoordinatorConfig = CoordinatorConfig::default(),
        registry: RegistryConfig = RegistryConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_timings() {
        let config = Config::default();
        assert_eq!(config.coordinator.debounce(), Duration::from_millis(1000));
        assert_eq!(config.coordinator.consistency_delay(), Duration::from_millis(500));
        assert_eq!(config.coordinator.max_attempts, 3);
        assert_eq!(config.coordinator.backoff(2), Duration::from_millis(400));
        assert_eq!(config.registry.client_timeout(), Duration::from_secs(120));
        assert_eq!(config.registry.keepalive_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [webserver]
            port = 9100

            [coordinator]
            debounce_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.webserver.port, 9100);
        assert_eq!(config.webserver.host, "127.0.0.1");
        assert_eq!(config.coordinator.debounce_ms, 250);
        assert_eq!(config.coordinator.max_attempts, 3);
        assert_eq!(config.cache.key, "statistics:aggregated");
    }
}
