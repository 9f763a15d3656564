/// Local cache tier configuration
///
/// The aggregate snapshot is a single key, so the fallback tier stays tiny.
/// Ranking queries with custom limits are cheap to recompute and never cached.
use std::time::Duration;

use crate::config::StatsCacheConfig;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live for cached entries
    pub ttl: Duration,

    /// Maximum number of entries (LRU eviction when exceeded)
    pub capacity: usize,
}

impl CacheConfig {
    /// Aggregate snapshot fallback tier, driven by the `[cache]` section
    pub fn aggregate_snapshot(section: &StatsCacheConfig) -> Self {
        Self {
            ttl: section.ttl(),
            capacity: section.fallback_capacity.max(1),
        }
    }

    /// Custom configuration
    pub fn custom(ttl_secs: u64, capacity: usize) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_capacity_never_zero() {
        let section = StatsCacheConfig {
            fallback_capacity: 0,
            ..Default::default()
        };
        let config = CacheConfig::aggregate_snapshot(&section);
        assert_eq!(config.capacity, 1);
        assert_eq!(config.ttl, Duration::from_secs(300));
    }
}
