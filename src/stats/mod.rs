//! Statistics pipeline
//!
//! Raw operator/result records are pulled from a `StatsSource`, reduced by
//! `compute` and served through the caching `StatsAggregator`.

pub mod aggregator;
pub mod compute;
pub mod source;
pub mod types;

pub use aggregator::StatsAggregator;
pub use source::{HttpStatsSource, MemoryStatsSource, StatsSource};
pub use types::{
    AggregateStats, GlobalStats, OperatorRecord, OperatorStat, ProductStat, ResultRecord, Totals,
};
