/// Raw record sources
///
/// The aggregator reads operators and results from a `StatsSource`:
/// - `HttpStatsSource` - the records API over HTTP (raw reqwest)
/// - `MemoryStatsSource` - in-process store for demos and tests
///
/// Endpoints of the records API:
/// - GET {base_url}/operators -> [OperatorRecord]
/// - GET {base_url}/results   -> [ResultRecord]
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

use super::types::{OperatorRecord, ResultRecord};
use crate::config::SourceConfig;
use crate::errors::SourceError;
use crate::logger::{self, LogTag};

const ENDPOINT_OPERATORS: &str = "operators";
const ENDPOINT_RESULTS: &str = "results";

#[async_trait]
pub trait StatsSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_operators(&self) -> Result<Vec<OperatorRecord>, SourceError>;

    async fn fetch_results(&self) -> Result<Vec<ResultRecord>, SourceError>;
}

// ============================================================================
// HTTP SOURCE
// ============================================================================

pub struct HttpStatsSource {
    client: Client,
    base_url: Url,
}

impl HttpStatsSource {
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        // Url::join drops the last path segment unless it ends with '/'
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| SourceError::Config(format!("invalid base_url '{}': {}", base, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SourceError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        collection: &'static str,
    ) -> Result<Vec<T>, SourceError> {
        let url = self
            .base_url
            .join(collection)
            .map_err(|e| SourceError::Config(e.to_string()))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::Fetch {
                collection,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Fetch {
                collection,
                reason: format!("HTTP {} from {}", status, url),
            });
        }

        let records = response
            .json::<Vec<T>>()
            .await
            .map_err(|e| SourceError::Malformed {
                collection,
                reason: e.to_string(),
            })?;

        logger::debug(
            LogTag::Stats,
            &format!("Fetched {} {} from {}", records.len(), collection, url),
        );

        Ok(records)
    }
}

#[async_trait]
impl StatsSource for HttpStatsSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_operators(&self) -> Result<Vec<OperatorRecord>, SourceError> {
        self.get_collection(ENDPOINT_OPERATORS).await
    }

    async fn fetch_results(&self) -> Result<Vec<ResultRecord>, SourceError> {
        self.get_collection(ENDPOINT_RESULTS).await
    }
}

// ============================================================================
// MEMORY SOURCE
// ============================================================================

#[derive(Default)]
pub struct MemoryStatsSource {
    operators: RwLock<Vec<OperatorRecord>>,
    results: RwLock<Vec<ResultRecord>>,
    failing: AtomicBool,
    fetches: AtomicU64,
}

impl MemoryStatsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small plant-floor data set for `--demo`
    pub fn with_demo_data() -> Self {
        let source = Self::new();
        let now = Utc::now();

        for (id, name) in [("op-1", "Ada Byron"), ("op-2", "Grace Hopper"), ("op-3", "Alan Kay")] {
            source.add_operator(OperatorRecord {
                id: id.to_string(),
                name: name.to_string(),
                created_at: Some(now - ChronoDuration::days(30)),
            });
        }

        let products = ["PSU-200", "FAN-12", "MB-X570", "PSU-450"];
        for i in 0..24u32 {
            source.add_result(ResultRecord {
                id: format!("r-{}", i + 1),
                operator_id: format!("op-{}", i % 3 + 1),
                session_id: format!("s-{}", i / 4 + 1),
                product: products[(i % 4) as usize].to_string(),
                passed: i % 5 != 0,
                duration_secs: 20.0 + f64::from(i % 7) * 3.5,
                created_at: now - ChronoDuration::minutes(i64::from(24 - i) * 10),
            });
        }

        source
    }

    pub fn add_operator(&self, operator: OperatorRecord) {
        self.operators.write().push(operator);
    }

    pub fn add_result(&self, result: ResultRecord) {
        self.results.write().push(result);
    }

    /// Remove a result by id, returning it
    pub fn remove_result(&self, id: &str) -> Option<ResultRecord> {
        let mut results = self.results.write();
        let index = results.iter().position(|r| r.id == id)?;
        Some(results.remove(index))
    }

    /// Make every fetch fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetch calls served so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check(&self, collection: &'static str) -> Result<(), SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Fetch {
                collection,
                reason: "memory source set to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StatsSource for MemoryStatsSource {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_operators(&self) -> Result<Vec<OperatorRecord>, SourceError> {
        self.check(ENDPOINT_OPERATORS)?;
        Ok(self.operators.read().clone())
    }

    async fn fetch_results(&self) -> Result<Vec<ResultRecord>, SourceError> {
        self.check(ENDPOINT_RESULTS)?;
        Ok(self.results.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_source_normalizes_base_url() {
        let config = SourceConfig {
            base_url: "http://records.local/api".to_string(),
            ..Default::default()
        };
        let source = HttpStatsSource::new(&config).unwrap();
        assert_eq!(
            source.base_url.join(ENDPOINT_RESULTS).unwrap().as_str(),
            "http://records.local/api/results"
        );
    }

    #[test]
    fn test_http_source_rejects_bad_url() {
        let config = SourceConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpStatsSource::new(&config),
            Err(SourceError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryStatsSource::with_demo_data();
        assert_eq!(source.fetch_operators().await.unwrap().len(), 3);
        assert_eq!(source.fetch_results().await.unwrap().len(), 24);
        assert!(source.remove_result("r-1").is_some());
        assert_eq!(source.fetch_results().await.unwrap().len(), 23);

        source.set_failing(true);
        assert!(source.fetch_results().await.is_err());
        assert_eq!(source.fetch_count(), 4);
    }
}
