//! Prometheus metrics plumbing shared by both services.
//!
//! Exposes metrics in Prometheus/OpenMetrics format. Load generator:
//! - `loadgen_requests_total{status}` - counter of dispatch outcomes
//! - `loadgen_request_duration_seconds` - histogram of request latency
//! - `loadgen_current_rps` - gauge, requests started in the last second
//! - `loadgen_inflight_requests` - gauge of in-flight dispatches
//! - `loadgen_test_running` - gauge, 1 while a test is running
//!
//! Limiter:
//! - `ratelimiter_requests_total{decision}` - forwarded/rejected counter
//! - `ratelimiter_requests_by_algorithm_total{algorithm}` - per-algorithm decisions
//! - `ratelimiter_request_duration_seconds` - histogram of proxy latency
//! - `ratelimiter_store_request_duration_seconds` - histogram of store latency
//! - `ratelimiter_store_errors_total` - counter of store failures
//! - `ratelimiter_current_limit` / `ratelimiter_window_seconds` /
//!   `ratelimiter_bucket_capacity` / `ratelimiter_token_fill_rate` - live config gauges
//! - `ratelimiter_store_connected` - gauge, 1 while the store answers
//! - `ratelimiter_mode{type="failopen"}` - gauge, 1 while degraded

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Histogram buckets sized for local-network request latencies.
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the process-wide Prometheus recorder.
///
/// Must be called once at startup before any metrics are recorded. Repeated
/// calls return the already-installed handle, which keeps tests that share a
/// process happy.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .set_buckets(LATENCY_BUCKETS)
                .expect("histogram bucket list is non-empty")
                .install_recorder()
                .expect("install Prometheus metrics recorder")
        })
        .clone()
}

/// Render the current metric families as Prometheus text exposition.
pub fn render_metrics() -> String {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render()).unwrap_or_default()
}

/// Register descriptions for the load generator's metric families.
pub fn describe_loadgen_metrics() {
    describe_counter!("loadgen_requests_total", "Total HTTP requests sent by the load generator");
    describe_histogram!("loadgen_request_duration_seconds", "HTTP request latency in seconds");
    describe_gauge!("loadgen_current_rps", "Requests started during the last second");
    describe_gauge!("loadgen_inflight_requests", "Number of in-flight requests");
    describe_gauge!("loadgen_test_running", "Whether a load test is currently running");
}

/// Register descriptions for the limiter's metric families.
pub fn describe_limiter_metrics() {
    describe_counter!("ratelimiter_requests_total", "Admission decisions by outcome");
    describe_counter!(
        "ratelimiter_requests_by_algorithm_total",
        "Admission decisions by active algorithm"
    );
    describe_histogram!(
        "ratelimiter_request_duration_seconds",
        "Proxy request duration in seconds"
    );
    describe_histogram!(
        "ratelimiter_store_request_duration_seconds",
        "Shared-store round-trip duration in seconds"
    );
    describe_counter!("ratelimiter_store_errors_total", "Shared-store operation failures");
    describe_gauge!("ratelimiter_current_limit", "Current request limit");
    describe_gauge!("ratelimiter_window_seconds", "Current window length in seconds");
    describe_gauge!("ratelimiter_bucket_capacity", "Current token bucket capacity");
    describe_gauge!("ratelimiter_token_fill_rate", "Current token fill rate per second");
    describe_gauge!("ratelimiter_store_connected", "Whether the shared store is reachable");
    describe_gauge!("ratelimiter_mode", "1 while the limiter is degraded to fail-open");
}
