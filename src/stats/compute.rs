//! Reference aggregate transform
//!
//! Pure functions from raw records to statistics. No I/O, no caching.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::types::{
    AggregateStats, GlobalStats, OperatorRecord, OperatorStat, ProductStat, ResultRecord, Totals,
};

/// Size of the ranking lists embedded in the full snapshot
pub const SNAPSHOT_TOP_N: usize = 10;

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round2(part as f64 * 100.0 / whole as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the full snapshot
pub fn compute_aggregate(operators: &[OperatorRecord], results: &[ResultRecord]) -> AggregateStats {
    if operators.is_empty() && results.is_empty() {
        return AggregateStats::default();
    }

    let latest = results.iter().max_by_key(|r| r.created_at);

    AggregateStats {
        top_operators: top_operators(operators, results, SNAPSHOT_TOP_N),
        top_products: top_products(results, SNAPSHOT_TOP_N),
        all_products: all_products(results),
        latest_operator_id: latest.map(|r| r.operator_id.clone()).unwrap_or_default(),
        latest_session_id: latest.map(|r| r.session_id.clone()).unwrap_or_default(),
        average_duration: average_duration(results),
        average_pass_rate: average_pass_rate(results),
        totals: totals(operators, results),
    }
}

/// Snapshot without ranking lists
pub fn global_stats(operators: &[OperatorRecord], results: &[ResultRecord]) -> GlobalStats {
    let latest = results.iter().max_by_key(|r| r.created_at);

    GlobalStats {
        all_products: all_products(results),
        latest_operator_id: latest.map(|r| r.operator_id.clone()).unwrap_or_default(),
        latest_session_id: latest.map(|r| r.session_id.clone()).unwrap_or_default(),
        average_duration: average_duration(results),
        average_pass_rate: average_pass_rate(results),
        totals: totals(operators, results),
    }
}

pub fn totals(operators: &[OperatorRecord], results: &[ResultRecord]) -> Totals {
    let passed = results.iter().filter(|r| r.passed).count() as u64;
    let sessions = results
        .iter()
        .map(|r| r.session_id.as_str())
        .collect::<HashSet<_>>()
        .len() as u64;

    Totals {
        operators: operators.len() as u64,
        products: all_products(results).len() as u64,
        passed,
        failed: results.len() as u64 - passed,
        sessions,
    }
}

/// Sorted, de-duplicated product names
pub fn all_products(results: &[ResultRecord]) -> Vec<String> {
    results
        .iter()
        .map(|r| r.product.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Mean duration over results with a usable duration
pub fn average_duration(results: &[ResultRecord]) -> f64 {
    let durations: Vec<f64> = results
        .iter()
        .map(|r| r.duration_secs)
        .filter(|d| d.is_finite() && *d >= 0.0)
        .collect();

    if durations.is_empty() {
        return 0.0;
    }
    round2(durations.iter().sum::<f64>() / durations.len() as f64)
}

pub fn average_pass_rate(results: &[ResultRecord]) -> f64 {
    let passed = results.iter().filter(|r| r.passed).count() as u64;
    percentage(passed, results.len() as u64)
}

/// Operators ranked by distinct sessions, then test count
pub fn top_operators(
    operators: &[OperatorRecord],
    results: &[ResultRecord],
    limit: usize,
) -> Vec<OperatorStat> {
    struct Acc<'a> {
        sessions: HashSet<&'a str>,
        tests: u64,
        passed: u64,
    }

    let names: HashMap<&str, &str> = operators
        .iter()
        .map(|o| (o.id.as_str(), o.name.as_str()))
        .collect();

    let mut by_operator: HashMap<&str, Acc> = HashMap::new();
    for result in results {
        let acc = by_operator
            .entry(result.operator_id.as_str())
            .or_insert_with(|| Acc {
                sessions: HashSet::new(),
                tests: 0,
                passed: 0,
            });
        acc.sessions.insert(result.session_id.as_str());
        acc.tests += 1;
        if result.passed {
            acc.passed += 1;
        }
    }

    let mut ranked: Vec<OperatorStat> = by_operator
        .into_iter()
        .map(|(operator_id, acc)| OperatorStat {
            operator_id: operator_id.to_string(),
            name: names.get(operator_id).unwrap_or(&operator_id).to_string(),
            sessions: acc.sessions.len() as u64,
            tests: acc.tests,
            passed: acc.passed,
            pass_rate: percentage(acc.passed, acc.tests),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.sessions
            .cmp(&a.sessions)
            .then(b.tests.cmp(&a.tests))
            .then(a.operator_id.cmp(&b.operator_id))
    });
    ranked.truncate(limit);
    ranked
}

/// Products ranked by number of tests
pub fn top_products(results: &[ResultRecord], limit: usize) -> Vec<ProductStat> {
    let mut by_product: HashMap<&str, (u64, u64)> = HashMap::new();
    for result in results {
        let (tests, passed) = by_product.entry(result.product.as_str()).or_default();
        *tests += 1;
        if result.passed {
            *passed += 1;
        }
    }

    let mut ranked: Vec<ProductStat> = by_product
        .into_iter()
        .map(|(product, (tests, passed))| ProductStat {
            product: product.to_string(),
            tests,
            passed,
            failed: tests - passed,
            pass_rate: percentage(passed, tests),
        })
        .collect();

    ranked.sort_by(|a, b| b.tests.cmp(&a.tests).then(a.product.cmp(&b.product)));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn operator(id: &str, name: &str) -> OperatorRecord {
        OperatorRecord {
            id: id.to_string(),
            name: name.to_string(),
            created_at: None,
        }
    }

    fn result(
        id: &str,
        operator_id: &str,
        session_id: &str,
        product: &str,
        passed: bool,
        duration_secs: f64,
        minutes: i64,
    ) -> ResultRecord {
        ResultRecord {
            id: id.to_string(),
            operator_id: operator_id.to_string(),
            session_id: session_id.to_string(),
            product: product.to_string(),
            passed,
            duration_secs,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    fn fixture() -> (Vec<OperatorRecord>, Vec<ResultRecord>) {
        let operators = vec![operator("op-1", "Ada"), operator("op-2", "Grace")];
        let results = vec![
            result("r-1", "op-1", "s-1", "PSU-200", true, 30.0, 0),
            result("r-2", "op-1", "s-1", "FAN-12", false, 10.0, 1),
            result("r-3", "op-1", "s-2", "PSU-200", true, 20.0, 2),
            result("r-4", "op-2", "s-3", "PSU-200", true, 40.0, 5),
        ];
        (operators, results)
    }

    #[test]
    fn test_empty_sources_yield_zeroed_default() {
        assert_eq!(compute_aggregate(&[], &[]), AggregateStats::default());
    }

    #[test]
    fn test_compute_aggregate() {
        let (operators, results) = fixture();
        let stats = compute_aggregate(&operators, &results);

        assert_eq!(stats.totals.operators, 2);
        assert_eq!(stats.totals.products, 2);
        assert_eq!(stats.totals.passed, 3);
        assert_eq!(stats.totals.failed, 1);
        assert_eq!(stats.totals.sessions, 3);
        assert_eq!(stats.all_products, vec!["FAN-12", "PSU-200"]);
        assert_eq!(stats.latest_operator_id, "op-2");
        assert_eq!(stats.latest_session_id, "s-3");
        assert_eq!(stats.average_duration, 25.0);
        assert_eq!(stats.average_pass_rate, 75.0);
        assert!(stats.has_data());
    }

    #[test]
    fn test_top_operators_ranking() {
        let (operators, results) = fixture();
        let ranked = top_operators(&operators, &results, 10);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].operator_id, "op-1");
        assert_eq!(ranked[0].name, "Ada");
        assert_eq!(ranked[0].sessions, 2);
        assert_eq!(ranked[0].tests, 3);
        assert_eq!(ranked[0].pass_rate, 66.67);

        assert_eq!(top_operators(&operators, &results, 1).len(), 1);
    }

    #[test]
    fn test_unknown_operator_uses_id_as_name() {
        let results = vec![result("r-1", "op-9", "s-1", "PSU-200", true, 1.0, 0)];
        let ranked = top_operators(&[], &results, 10);
        assert_eq!(ranked[0].name, "op-9");
    }

    #[test]
    fn test_top_products_ranking() {
        let (_, results) = fixture();
        let ranked = top_products(&results, 1);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].product, "PSU-200");
        assert_eq!(ranked[0].tests, 3);
        assert_eq!(ranked[0].failed, 0);
        assert_eq!(ranked[0].pass_rate, 100.0);
    }

    #[test]
    fn test_invalid_durations_ignored() {
        let results = vec![
            result("r-1", "op-1", "s-1", "PSU-200", true, -5.0, 0),
            result("r-2", "op-1", "s-1", "PSU-200", true, f64::NAN, 1),
            result("r-3", "op-1", "s-1", "PSU-200", true, 12.0, 2),
        ];
        assert_eq!(average_duration(&results), 12.0);
    }
}
