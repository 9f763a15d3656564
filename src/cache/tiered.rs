/// Two-tier snapshot cache
///
/// Reads go to the primary tier first. The local fallback is consulted only
/// when the primary is unreachable or holds a payload of the wrong shape.
/// Writes always land in the fallback, and in the primary when it answers.
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::config::CacheConfig;
use super::manager::{FallbackCache, FallbackMetrics};
use super::primary::PrimaryCache;
use crate::logger::{self, LogTag};

/// Values stored in the tiered cache
pub trait CachePayload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Semantic check beyond the structural one done by deserialization
    fn is_valid(&self) -> bool {
        true
    }
}

/// Envelope written to both tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub written_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

impl<T> CacheEntry<T> {
    fn new(payload: T, ttl: Duration) -> Self {
        Self {
            payload,
            written_at: Utc::now(),
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    fn age(&self) -> Duration {
        (Utc::now() - self.written_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTier {
    Primary,
    Fallback,
}

/// Where `get_cache_info` found the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    Primary,
    Fallback,
    None,
}

#[derive(Debug, Clone)]
pub struct CacheHit<T> {
    pub value: T,
    pub tier: CacheTier,
    pub age: Duration,
}

/// Cache diagnostics for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub key: String,
    pub backend: &'static str,
    pub cached: bool,
    pub source: CacheSource,
    pub age_ms: Option<u64>,
    /// A primary entry exists but is past its TTL
    pub expired: bool,
    pub ttl_ms: u64,
    pub expires_in_ms: Option<u64>,
    pub primary_available: bool,
    pub primary_errors: u64,
    pub fallback_entries: usize,
    pub fallback_metrics: FallbackMetrics,
}

pub struct TieredCache<T: CachePayload> {
    key: String,
    ttl: Duration,
    primary: Arc<dyn PrimaryCache>,
    fallback: FallbackCache<String, CacheEntry<T>>,
    primary_available: AtomicBool,
    primary_errors: AtomicU64,
}

impl<T: CachePayload> TieredCache<T> {
    pub fn new(key: impl Into<String>, primary: Arc<dyn PrimaryCache>, config: CacheConfig) -> Self {
        Self {
            key: key.into(),
            ttl: config.ttl,
            primary,
            fallback: FallbackCache::new(config),
            primary_available: AtomicBool::new(true),
            primary_errors: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_primary_available(&self) -> bool {
        self.primary_available.load(Ordering::Relaxed)
    }

    fn record_primary(&self, ok: bool) {
        let was = self.primary_available.swap(ok, Ordering::Relaxed);
        if !ok {
            self.primary_errors.fetch_add(1, Ordering::Relaxed);
        }
        if was != ok {
            if ok {
                logger::info(LogTag::Cache, "Primary cache reachable again");
            } else {
                logger::warning(LogTag::Cache, "Primary cache unreachable, serving from local fallback");
            }
        }
    }

    fn decode(&self, raw: &str) -> Option<CacheEntry<T>> {
        match serde_json::from_str::<CacheEntry<T>>(raw) {
            Ok(entry) if entry.payload.is_valid() => Some(entry),
            Ok(_) => {
                logger::warning(
                    LogTag::Cache,
                    &format!("Cached payload under '{}' failed validation", self.key),
                );
                None
            }
            Err(e) => {
                logger::warning(
                    LogTag::Cache,
                    &format!("Cached payload under '{}' has invalid shape: {}", self.key, e),
                );
                None
            }
        }
    }

    /// Fresh value from the primary tier, or the fallback when the primary
    /// cannot answer with a usable payload
    pub async fn get(&self) -> Option<CacheHit<T>> {
        match self.primary.get(&self.key).await {
            Ok(Some(raw)) => {
                self.record_primary(true);
                if let Some(entry) = self.decode(&raw) {
                    let age = entry.age();
                    if age >= self.ttl {
                        logger::debug(LogTag::Cache, "Primary entry past TTL, treating as miss");
                        return None;
                    }
                    return Some(CacheHit {
                        value: entry.payload,
                        tier: CacheTier::Primary,
                        age,
                    });
                }
            }
            Ok(None) => {
                self.record_primary(true);
                return None;
            }
            Err(e) => {
                self.record_primary(false);
                logger::debug(LogTag::Cache, &format!("Primary read failed: {}", e));
            }
        }

        self.read_fallback()
    }

    fn read_fallback(&self) -> Option<CacheHit<T>> {
        let (entry, age) = self.fallback.get_with_age(&self.key)?;
        if !entry.payload.is_valid() {
            self.fallback.remove(&self.key);
            return None;
        }
        logger::debug(LogTag::Cache, "Served snapshot from local fallback");
        Some(CacheHit {
            value: entry.payload,
            tier: CacheTier::Fallback,
            age,
        })
    }

    /// Write-through to both tiers. Primary failures are logged, never raised.
    pub async fn put(&self, value: &T) {
        let entry = CacheEntry::new(value.clone(), self.ttl);

        match serde_json::to_string(&entry) {
            Ok(raw) => match self.primary.set(&self.key, raw, self.ttl).await {
                Ok(()) => self.record_primary(true),
                Err(e) => {
                    self.record_primary(false);
                    logger::warning(LogTag::Cache, &format!("Primary cache write failed: {}", e));
                }
            },
            Err(e) => {
                logger::error(LogTag::Cache, &format!("Failed to encode snapshot: {}", e));
            }
        }

        self.fallback.insert(self.key.clone(), entry);
    }

    /// Drop the snapshot from both tiers
    pub async fn invalidate(&self) {
        match self.primary.delete(&self.key).await {
            Ok(()) => self.record_primary(true),
            Err(e) => {
                self.record_primary(false);
                logger::warning(LogTag::Cache, &format!("Primary cache delete failed: {}", e));
            }
        }
        self.fallback.clear();
    }

    pub async fn info(&self) -> CacheInfo {
        // Mirrors the read path: the fallback only counts when the primary
        // is unreachable or holds something unusable
        let (primary_age, use_fallback) = match self.primary.get(&self.key).await {
            Ok(Some(raw)) => {
                self.record_primary(true);
                match self.decode(&raw) {
                    Some(entry) => (Some(entry.age()), false),
                    None => (None, true),
                }
            }
            Ok(None) => {
                self.record_primary(true);
                (None, false)
            }
            Err(_) => {
                self.record_primary(false);
                (None, true)
            }
        };

        let expired = primary_age.map(|age| age >= self.ttl).unwrap_or(false);
        let (source, age) = match primary_age {
            Some(age) if !expired => (CacheSource::Primary, Some(age)),
            _ if use_fallback => match self.fallback.peek_age(&self.key) {
                Some(age) => (CacheSource::Fallback, Some(age)),
                None => (CacheSource::None, None),
            },
            _ => (CacheSource::None, None),
        };

        CacheInfo {
            key: self.key.clone(),
            backend: self.primary.backend(),
            cached: source != CacheSource::None,
            source,
            age_ms: age.map(|a| a.as_millis() as u64),
            expired,
            ttl_ms: self.ttl.as_millis() as u64,
            expires_in_ms: age.map(|a| self.ttl.saturating_sub(a).as_millis() as u64),
            primary_available: self.is_primary_available(),
            primary_errors: self.primary_errors.load(Ordering::Relaxed),
            fallback_entries: self.fallback.len(),
            fallback_metrics: self.fallback.metrics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryPrimaryCache;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        count: u64,
    }

    impl CachePayload for Sample {
        fn is_valid(&self) -> bool {
            self.count < 1000
        }
    }

    fn tiered(primary: Arc<MemoryPrimaryCache>) -> TieredCache<Sample> {
        TieredCache::new("sample", primary, CacheConfig::custom(300, 4))
    }

    #[tokio::test]
    async fn test_primary_hit() {
        let primary = Arc::new(MemoryPrimaryCache::new());
        let cache = tiered(primary);

        cache.put(&Sample { count: 7 }).await;
        let hit = cache.get().await.unwrap();
        assert_eq!(hit.value, Sample { count: 7 });
        assert_eq!(hit.tier, CacheTier::Primary);
    }

    #[tokio::test]
    async fn test_fallback_when_primary_down() {
        let primary = Arc::new(MemoryPrimaryCache::new());
        let cache = tiered(primary.clone());

        cache.put(&Sample { count: 3 }).await;
        primary.set_available(false);

        let hit = cache.get().await.unwrap();
        assert_eq!(hit.tier, CacheTier::Fallback);
        assert_eq!(hit.value.count, 3);
        assert!(!cache.is_primary_available());
    }

    #[tokio::test]
    async fn test_invalid_shape_falls_back() {
        let primary = Arc::new(MemoryPrimaryCache::new());
        let cache = tiered(primary.clone());

        cache.put(&Sample { count: 5 }).await;
        primary.insert_raw("sample", r#"{"payload":{"wrong":true}}"#, Duration::from_secs(60));

        let hit = cache.get().await.unwrap();
        assert_eq!(hit.tier, CacheTier::Fallback);
        assert_eq!(hit.value.count, 5);
    }

    #[tokio::test]
    async fn test_failed_validation_is_miss() {
        let primary = Arc::new(MemoryPrimaryCache::new());
        let cache = tiered(primary);

        cache.put(&Sample { count: 5000 }).await;
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_primary_miss_skips_fallback() {
        let primary = Arc::new(MemoryPrimaryCache::new());
        let cache = tiered(primary.clone());

        cache.put(&Sample { count: 1 }).await;
        primary.delete("sample").await.unwrap();
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_clears_both_tiers() {
        let primary = Arc::new(MemoryPrimaryCache::new());
        let cache = tiered(primary.clone());

        cache.put(&Sample { count: 1 }).await;
        cache.invalidate().await;
        primary.set_available(false);

        assert!(cache.get().await.is_none());
        let info = cache.info().await;
        assert!(!info.cached);
        assert_eq!(info.source, CacheSource::None);
    }

    #[tokio::test]
    async fn test_info_reports_tier() {
        let primary = Arc::new(MemoryPrimaryCache::new());
        let cache = tiered(primary.clone());

        cache.put(&Sample { count: 1 }).await;
        let info = cache.info().await;
        assert!(info.cached);
        assert_eq!(info.source, CacheSource::Primary);
        assert!(!info.expired);
        assert_eq!(info.backend, "memory");
        assert_eq!(info.ttl_ms, 300_000);

        primary.set_available(false);
        let info = cache.info().await;
        assert_eq!(info.source, CacheSource::Fallback);
        assert!(!info.primary_available);
    }
}
