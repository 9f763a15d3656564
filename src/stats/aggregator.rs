/// Statistics aggregator
///
/// Cache-aside over the raw record source: the full snapshot is served from
/// the tiered cache while fresh and recomputed on miss. Ranking and global
/// queries with caller-chosen limits always go to the source.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::compute;
use super::source::StatsSource;
use super::types::{AggregateStats, GlobalStats, OperatorRecord, OperatorStat, ProductStat, ResultRecord};
use crate::cache::{CacheConfig, CacheInfo, PrimaryCache, TieredCache};
use crate::config::StatsCacheConfig;
use crate::errors::SourceError;
use crate::logger::{self, LogTag};

pub struct StatsAggregator {
    source: Arc<dyn StatsSource>,
    cache: TieredCache<AggregateStats>,
    computations: AtomicU64,
}

impl StatsAggregator {
    pub fn new(
        source: Arc<dyn StatsSource>,
        primary: Arc<dyn PrimaryCache>,
        config: &StatsCacheConfig,
    ) -> Self {
        Self {
            source,
            cache: TieredCache::new(
                config.key.clone(),
                primary,
                CacheConfig::aggregate_snapshot(config),
            ),
            computations: AtomicU64::new(0),
        }
    }

    /// Full snapshot. `force_refresh` skips the cache read but still writes.
    pub async fn get_aggregated_stats(
        &self,
        force_refresh: bool,
    ) -> Result<AggregateStats, SourceError> {
        if !force_refresh {
            if let Some(hit) = self.cache.get().await {
                logger::debug(
                    LogTag::Stats,
                    &format!(
                        "Snapshot cache hit ({:?}, age {}ms)",
                        hit.tier,
                        hit.age.as_millis()
                    ),
                );
                return Ok(hit.value);
            }
        }

        let (operators, results) = self.load_records().await?;
        let stats = compute::compute_aggregate(&operators, &results);
        let n = self.computations.fetch_add(1, Ordering::Relaxed) + 1;

        logger::debug(
            LogTag::Stats,
            &format!(
                "Computed snapshot #{} from {} operators / {} results",
                n,
                operators.len(),
                results.len()
            ),
        );

        self.cache.put(&stats).await;
        Ok(stats)
    }

    async fn load_records(&self) -> Result<(Vec<OperatorRecord>, Vec<ResultRecord>), SourceError> {
        tokio::try_join!(self.source.fetch_operators(), self.source.fetch_results())
    }

    pub async fn clear_cache(&self) {
        self.cache.invalidate().await;
        logger::debug(LogTag::Stats, "Snapshot cache cleared");
    }

    pub async fn get_cache_info(&self) -> CacheInfo {
        self.cache.info().await
    }

    pub async fn get_top_operators(&self, limit: usize) -> Result<Vec<OperatorStat>, SourceError> {
        let (operators, results) = self.load_records().await?;
        Ok(compute::top_operators(&operators, &results, limit))
    }

    pub async fn get_top_products(&self, limit: usize) -> Result<Vec<ProductStat>, SourceError> {
        let results = self.source.fetch_results().await?;
        Ok(compute::top_products(&results, limit))
    }

    pub async fn get_all_products(&self) -> Result<Vec<String>, SourceError> {
        let results = self.source.fetch_results().await?;
        Ok(compute::all_products(&results))
    }

    pub async fn get_global_stats(&self) -> Result<GlobalStats, SourceError> {
        let (operators, results) = self.load_records().await?;
        Ok(compute::global_stats(&operators, &results))
    }

    /// Snapshots computed since startup
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }
}
