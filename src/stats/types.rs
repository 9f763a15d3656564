/// Statistics data model
///
/// Raw records as delivered by the record stores, and the aggregate
/// snapshot distributed to clients.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CachePayload;

// ============================================================================
// RAW RECORDS
// ============================================================================

/// An operator who performs diagnostic runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A single diagnostic test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub operator_id: String,
    pub session_id: String,
    pub product: String,
    pub passed: bool,
    /// Test duration in seconds
    pub duration_secs: f64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// AGGREGATE SNAPSHOT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorStat {
    pub operator_id: String,
    pub name: String,
    pub sessions: u64,
    pub tests: u64,
    pub passed: u64,
    /// Percentage 0..=100
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStat {
    pub product: String,
    pub tests: u64,
    pub passed: u64,
    pub failed: u64,
    /// Percentage 0..=100
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub operators: u64,
    pub products: u64,
    pub passed: u64,
    pub failed: u64,
    pub sessions: u64,
}

/// Full statistics snapshot. Always replaced wholesale, never patched.
///
/// No `#[serde(default)]` here: a cached payload missing any field must fail
/// to deserialize so it is never served.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub top_operators: Vec<OperatorStat>,
    pub top_products: Vec<ProductStat>,
    pub all_products: Vec<String>,
    pub latest_operator_id: String,
    pub latest_session_id: String,
    /// Mean test duration in seconds
    pub average_duration: f64,
    /// Mean pass rate percentage
    pub average_pass_rate: f64,
    pub totals: Totals,
}

impl AggregateStats {
    /// Heuristic used after a write: at least one headline total is nonzero
    pub fn has_data(&self) -> bool {
        self.totals.sessions > 0 || self.totals.operators > 0 || self.totals.products > 0
    }

    /// Snapshot without its ranking lists
    pub fn global(&self) -> GlobalStats {
        GlobalStats {
            all_products: self.all_products.clone(),
            latest_operator_id: self.latest_operator_id.clone(),
            latest_session_id: self.latest_session_id.clone(),
            average_duration: self.average_duration,
            average_pass_rate: self.average_pass_rate,
            totals: self.totals.clone(),
        }
    }
}

fn valid_measure(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

impl CachePayload for AggregateStats {
    fn is_valid(&self) -> bool {
        valid_measure(self.average_duration)
            && valid_measure(self.average_pass_rate)
            && self.top_operators.iter().all(|o| valid_measure(o.pass_rate))
            && self.top_products.iter().all(|p| valid_measure(p.pass_rate))
    }
}

/// `AggregateStats` minus the ranking lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub all_products: Vec<String>,
    pub latest_operator_id: String,
    pub latest_session_id: String,
    pub average_duration: f64,
    pub average_pass_rate: f64,
    pub totals: Totals,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zeroed() {
        let stats = AggregateStats::default();
        assert!(stats.top_operators.is_empty());
        assert!(stats.top_products.is_empty());
        assert!(stats.all_products.is_empty());
        assert_eq!(stats.latest_operator_id, "");
        assert_eq!(stats.latest_session_id, "");
        assert_eq!(stats.totals, Totals::default());
        assert!(!stats.has_data());
        assert!(stats.is_valid());
    }

    #[test]
    fn test_incomplete_payload_rejected() {
        let payload = serde_json::json!({
            "top_operators": [],
            "top_products": [],
            "totals": {"operators": 1, "products": 1, "passed": 1, "failed": 0, "sessions": 1}
        });
        assert!(serde_json::from_value::<AggregateStats>(payload).is_err());
    }

    #[test]
    fn test_negative_measure_invalid() {
        let stats = AggregateStats {
            average_duration: -3.0,
            ..Default::default()
        };
        assert!(!stats.is_valid());
    }
}
