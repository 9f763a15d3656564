/// Process-local fallback tier
///
/// Bounded map with per-entry expiry and least-recently-used eviction. It
/// keeps the last snapshot servable while the shared primary is unreachable.
use super::config::CacheConfig;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

struct Stamped<V> {
    value: V,
    stored: Instant,
}

impl<V> Stamped<V> {
    fn age(&self) -> Duration {
        self.stored.elapsed()
    }
}

/// Counters reported by the cache-info endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct FallbackMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub inserts: u64,
}

impl FallbackMetrics {
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            lookups => self.hits as f64 / lookups as f64,
        }
    }
}

struct Slots<K, V> {
    entries: HashMap<K, Stamped<V>>,
    // front is the eviction candidate
    recency: VecDeque<K>,
}

impl<K: Clone + Eq + Hash, V> Slots<K, V> {
    fn promote(&mut self, key: &K) {
        self.recency.retain(|k| k != key);
        self.recency.push_back(key.clone());
    }

    fn drop_key(&mut self, key: &K) {
        self.entries.remove(key);
        self.recency.retain(|k| k != key);
    }
}

pub struct FallbackCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    config: CacheConfig,
    slots: RwLock<Slots<K, V>>,
    metrics: Mutex<FallbackMetrics>,
}

impl<K, V> FallbackCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            slots: RwLock::new(Slots {
                entries: HashMap::new(),
                recency: VecDeque::new(),
            }),
            metrics: Mutex::new(FallbackMetrics::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_with_age(key).map(|(value, _)| value)
    }

    /// Live value and its age; expired entries are dropped on the way
    pub fn get_with_age(&self, key: &K) -> Option<(V, Duration)> {
        let mut slots = self.slots.write();
        let found = slots
            .entries
            .get(key)
            .map(|s| (s.age(), s.value.clone()));

        let mut metrics = self.metrics.lock();
        match found {
            Some((age, _)) if age >= self.config.ttl => {
                slots.drop_key(key);
                metrics.misses += 1;
                metrics.expirations += 1;
                None
            }
            Some((age, value)) => {
                slots.promote(key);
                metrics.hits += 1;
                Some((value, age))
            }
            None => {
                metrics.misses += 1;
                None
            }
        }
    }

    /// Age of a live entry; leaves recency and counters alone
    pub fn peek_age(&self, key: &K) -> Option<Duration> {
        self.slots
            .read()
            .entries
            .get(key)
            .map(|s| s.age())
            .filter(|age| *age < self.config.ttl)
    }

    pub fn insert(&self, key: K, value: V) {
        let mut slots = self.slots.write();

        let full = slots.entries.len() >= self.config.capacity;
        if full && !slots.entries.contains_key(&key) {
            if let Some(victim) = slots.recency.pop_front() {
                slots.entries.remove(&victim);
                self.metrics.lock().evictions += 1;
            }
        }

        slots.entries.insert(
            key.clone(),
            Stamped {
                value,
                stored: Instant::now(),
            },
        );
        slots.promote(&key);
        self.metrics.lock().inserts += 1;
    }

    pub fn remove(&self, key: &K) {
        self.slots.write().drop_key(key);
    }

    pub fn clear(&self) {
        let mut slots = self.slots.write();
        slots.entries.clear();
        slots.recency.clear();
    }

    pub fn metrics(&self) -> FallbackMetrics {
        self.metrics.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.slots.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_key() -> String {
        "stats:aggregate".to_string()
    }

    #[test]
    fn test_hit_and_miss_counting() {
        let cache = FallbackCache::new(CacheConfig::custom(60, 8));
        cache.insert(snapshot_key(), 42u32);

        assert_eq!(cache.get(&snapshot_key()), Some(42));
        assert_eq!(cache.get(&"stats:other".to_string()), None);

        let metrics = cache.metrics();
        assert_eq!((metrics.hits, metrics.misses, metrics.inserts), (1, 1, 1));
        assert_eq!(metrics.hit_rate(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = FallbackCache::new(CacheConfig::custom(1, 8));
        cache.insert(snapshot_key(), 7u32);

        tokio::time::advance(Duration::from_millis(400)).await;
        let (_, age) = cache.get_with_age(&snapshot_key()).unwrap();
        assert_eq!(age, Duration::from_millis(400));

        tokio::time::advance(Duration::from_millis(700)).await;
        assert_eq!(cache.peek_age(&snapshot_key()), None);
        assert_eq!(cache.get(&snapshot_key()), None);
        assert_eq!(cache.metrics().expirations, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_least_recent_entry_is_evicted() {
        let cache = FallbackCache::new(CacheConfig::custom(60, 2));
        cache.insert(1u8, "a");
        cache.insert(2u8, "b");
        assert!(cache.get(&1u8).is_some());
        cache.insert(3u8, "c");

        assert_eq!(cache.get(&2u8), None);
        assert_eq!(cache.get(&1u8), Some("a"));
        assert_eq!(cache.get(&3u8), Some("c"));
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn test_overwrite_at_capacity_keeps_others() {
        let cache = FallbackCache::new(CacheConfig::custom(60, 2));
        cache.insert(1u8, "a");
        cache.insert(2u8, "b");
        cache.insert(1u8, "a2");

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.metrics().evictions, 0);
        cache.clear();
        assert!(cache.is_empty());
    }
}
