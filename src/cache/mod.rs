//! Aggregate snapshot caching
//!
//! - `manager`: generic TTL + LRU in-memory cache (local fallback tier)
//! - `primary`: shared primary tier abstraction and in-process backend
//! - `redis`: Redis primary backend (feature `redis`)
//! - `tiered`: primary-then-fallback read path with write-through

pub mod config;
pub mod manager;
pub mod primary;
#[cfg(feature = "redis")]
pub mod redis;
pub mod tiered;

pub use config::CacheConfig;
pub use manager::{FallbackCache, FallbackMetrics};
pub use primary::{MemoryPrimaryCache, PrimaryCache};
#[cfg(feature = "redis")]
pub use self::redis::RedisPrimaryCache;
pub use tiered::{
    CacheEntry, CacheHit, CacheInfo, CachePayload, CacheSource, CacheTier, TieredCache,
};
