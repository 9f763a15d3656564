/// Primary (shared) cache tier
///
/// A string key/value store with per-key expiry. In production this is Redis
/// (see `redis.rs`); `MemoryPrimaryCache` serves single-process deployments
/// and tests.
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::errors::CacheError;

#[async_trait]
pub trait PrimaryCache: Send + Sync {
    /// Backend name for status output
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process primary cache
///
/// Availability can be toggled to exercise the fallback path.
pub struct MemoryPrimaryCache {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    available: AtomicBool,
}

impl MemoryPrimaryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backend going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Store a raw value, bypassing encoding (used to plant corrupt payloads)
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Duration) {
        self.entries
            .write()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }

    fn ensure_available(&self) -> Result<(), CacheError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::Unavailable("memory primary disabled".to_string()))
        }
    }
}

impl Default for MemoryPrimaryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrimaryCache for MemoryPrimaryCache {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.ensure_available()?;

        let mut entries = self.entries.write();
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.ensure_available()?;
        self.entries
            .write()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.ensure_available()?;
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_memory_primary_expiry() {
        let cache = MemoryPrimaryCache::new();
        cache
            .set("k", "v".to_string(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_primary_unavailable() {
        let cache = MemoryPrimaryCache::new();
        cache.set_available(false);

        assert!(matches!(
            cache.get("k").await,
            Err(CacheError::Unavailable(_))
        ));
        assert!(cache.delete("k").await.is_err());

        cache.set_available(true);
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
