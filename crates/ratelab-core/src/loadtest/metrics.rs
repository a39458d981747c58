//! Process-local load generator metrics.
//!
//! Counters are monotone for the life of the process; per-test numbers are
//! derived from baselines captured at test start. Each test bumps a run id,
//! and completions carrying a stale run id are dropped so late responses
//! from a previous test cannot pollute the current one.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

pub struct LoadMetrics {
    total_sent: AtomicU64,
    total_errors: AtomicU64,
    in_flight: AtomicI64,
    current_rps: AtomicU64,
    current_second: AtomicU64,
    test_running: AtomicBool,
    run_id: AtomicU64,
}

impl LoadMetrics {
    pub fn new() -> Arc<Self> {
        let metrics = Arc::new(Self {
            total_sent: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            in_flight: AtomicI64::new(0),
            current_rps: AtomicU64::new(0),
            current_second: AtomicU64::new(0),
            test_running: AtomicBool::new(false),
            run_id: AtomicU64::new(0),
        });
        metrics.start_rps_roller();
        metrics
    }

    /// Once per second, move the per-second counter into the RPS gauge.
    fn start_rps_roller(self: &Arc<Self>) {
        let metrics = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let rps = metrics.current_second.swap(0, Ordering::SeqCst);
                metrics.current_rps.store(rps, Ordering::SeqCst);
                gauge!("loadgen_current_rps").set(rps as f64);
            }
        });
    }

    /// New test: bump the run id and clear per-test gauges. Process-wide
    /// totals are left untouched; callers capture baselines instead.
    pub fn reset_for_new_test(&self) {
        self.run_id.fetch_add(1, Ordering::SeqCst);
        self.current_second.store(0, Ordering::SeqCst);
        self.current_rps.store(0, Ordering::SeqCst);
        self.in_flight.store(0, Ordering::SeqCst);
        gauge!("loadgen_current_rps").set(0.0);
        gauge!("loadgen_inflight_requests").set(0.0);
    }

    pub fn current_run_id(&self) -> u64 {
        self.run_id.load(Ordering::SeqCst)
    }

    pub fn record_request_start(&self, run_id: u64) {
        if run_id != self.current_run_id() {
            return;
        }
        self.total_sent.fetch_add(1, Ordering::SeqCst);
        self.current_second.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        gauge!("loadgen_inflight_requests").increment(1.0);
    }

    pub fn record_request_success(&self, run_id: u64, duration: Duration) {
        if run_id != self.current_run_id() {
            return;
        }
        counter!("loadgen_requests_total", "status" => "success").increment(1);
        self.finish_request(duration);
    }

    pub fn record_request_rate_limited(&self, run_id: u64, duration: Duration) {
        if run_id != self.current_run_id() {
            return;
        }
        counter!("loadgen_requests_total", "status" => "rate_limited").increment(1);
        self.finish_request(duration);
    }

    pub fn record_request_error(&self, run_id: u64, duration: Duration) {
        if run_id != self.current_run_id() {
            return;
        }
        counter!("loadgen_requests_total", "status" => "error").increment(1);
        self.total_errors.fetch_add(1, Ordering::SeqCst);
        self.finish_request(duration);
    }

    fn finish_request(&self, duration: Duration) {
        histogram!("loadgen_request_duration_seconds").record(duration.as_secs_f64());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        gauge!("loadgen_inflight_requests").decrement(1.0);
    }

    pub fn set_test_running(&self, running: bool) {
        self.test_running.store(running, Ordering::SeqCst);
        gauge!("loadgen_test_running").set(if running { 1.0 } else { 0.0 });
    }

    pub fn total_sent(&self) -> u64 {
        self.total_sent.load(Ordering::SeqCst)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::SeqCst)
    }

    pub fn current_rps(&self) -> u64 {
        self.current_rps.load(Ordering::SeqCst)
    }
}
