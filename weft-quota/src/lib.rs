//! Weft Quota - Per-namespace resource usage rollup
//!
//! Aggregates observed pods and persistent volume claims into a usage
//! `ResourceList` per (workspace, namespace) and reports hard-limit
//! violations. The aggregator never blocks admission; it only reports.

pub mod aggregator;

pub use aggregator::{aggregate_usage, detect_violations, QuotaAggregator};
