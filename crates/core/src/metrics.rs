//! Metrics definitions for query validation.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`. Without an installed
//! recorder every call here is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "queries_validated_total",
        "Total number of query inputs validated, by outcome"
    );
    describe_counter!(
        "query_violations_total",
        "Total number of violations reported for rejected queries"
    );
    describe_counter!(
        "query_schema_compilations_total",
        "Total number of query schemas compiled"
    );
    describe_histogram!(
        "query_validation_duration_seconds",
        "Time taken to validate a query input in seconds"
    );
}

/// Record a validated query input.
///
/// # Arguments
/// * `outcome` - "accepted" or "rejected"
pub fn record_query_validated(outcome: &'static str) {
    counter!("queries_validated_total", "outcome" => outcome).increment(1);
}

/// Record the violations of a rejected query.
pub fn record_query_violations(count: usize) {
    counter!("query_violations_total").increment(count as u64);
}

/// Record a (re)compiled query schema.
pub fn record_schema_compiled() {
    counter!("query_schema_compilations_total").increment(1);
}

/// Record validation duration.
pub fn record_validation_duration(duration_secs: f64) {
    histogram!("query_validation_duration_seconds").record(duration_secs);
}

/// A timer that records validation duration when dropped.
pub struct ValidationTimer {
    start: Instant,
}

impl ValidationTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ValidationTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ValidationTimer {
    fn drop(&mut self) {
        record_validation_duration(self.start.elapsed().as_secs_f64());
    }
}
