//! Redis primary cache tier.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::time::Duration;

use super::primary::PrimaryCache;
use crate::errors::CacheError;
use crate::logger::{self, LogTag};

/// Shared snapshot cache backed by Redis.
///
/// Values are stored with `SET .. EX` so Redis expires them on its own; the
/// connection manager reconnects transparently after outages.
pub struct RedisPrimaryCache {
    conn: ConnectionManager,
}

impl RedisPrimaryCache {
    /// Connect to Redis.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL (e.g., redis://localhost:6379)
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        logger::info(LogTag::Cache, &format!("Connected to Redis at {}", url));

        Ok(Self { conn })
    }
}

#[async_trait]
impl PrimaryCache for RedisPrimaryCache {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
