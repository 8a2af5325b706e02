//! Observability infrastructure for the recommender
//!
//! Prometheus metrics for recommendation latency, cache behaviour and
//! background refresh health. Exposition happens in the HTTP layer.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;

/// Histogram buckets for recommendation latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RecommenderMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct RecommenderMetricsInner {
    recommendation_latency_seconds: Histogram,
    recommendations_total: IntCounterVec,
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
    cache_entries: IntGauge,
    refresh_errors_total: IntCounter,
}

impl RecommenderMetricsInner {
    fn new() -> Self {
        Self {
            recommendation_latency_seconds: register_histogram!(
                "recommender_recommendation_latency_seconds",
                "Time spent computing a cluster recommendation",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register recommendation_latency_seconds"),

            recommendations_total: register_int_counter_vec!(
                "recommender_recommendations_total",
                "Number of successful cluster recommendations",
                &["provider"]
            )
            .expect("Failed to register recommendations_total"),

            cache_hits_total: register_int_counter!(
                "recommender_product_cache_hits_total",
                "Number of product info cache hits"
            )
            .expect("Failed to register cache_hits_total"),

            cache_misses_total: register_int_counter!(
                "recommender_product_cache_misses_total",
                "Number of product info cache misses"
            )
            .expect("Failed to register cache_misses_total"),

            cache_entries: register_int_gauge!(
                "recommender_product_cache_entries",
                "Number of live entries in the product info cache"
            )
            .expect("Failed to register cache_entries"),

            refresh_errors_total: register_int_counter!(
                "recommender_product_info_refresh_errors_total",
                "Number of failed product info renewals"
            )
            .expect("Failed to register refresh_errors_total"),
        }
    }
}

/// Recommender metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct RecommenderMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for RecommenderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommenderMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RecommenderMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RecommenderMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the latency of one recommendation
    pub fn observe_recommendation_latency(&self, duration_secs: f64) {
        self.inner()
            .recommendation_latency_seconds
            .observe(duration_secs);
    }

    /// Count a successful recommendation for a provider
    pub fn inc_recommendations(&self, provider: &str) {
        self.inner()
            .recommendations_total
            .with_label_values(&[provider])
            .inc();
    }

    /// Count a product info cache hit
    pub fn inc_cache_hits(&self) {
        self.inner().cache_hits_total.inc();
    }

    /// Count a product info cache miss
    pub fn inc_cache_misses(&self) {
        self.inner().cache_misses_total.inc();
    }

    /// Update the live cache entry count
    pub fn set_cache_entries(&self, entries: i64) {
        self.inner().cache_entries.set(entries);
    }

    /// Count a failed product info renewal
    pub fn inc_refresh_errors(&self) {
        self.inner().refresh_errors_total.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handle() {
        let metrics = RecommenderMetrics::new();

        metrics.observe_recommendation_latency(0.01);
        metrics.inc_recommendations("amazon");
        metrics.inc_cache_hits();
        metrics.inc_cache_misses();
        metrics.set_cache_entries(12);
        metrics.inc_refresh_errors();
    }
}
