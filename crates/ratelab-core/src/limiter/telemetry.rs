//! Per-interval traffic telemetry for the adaptive loop.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;

/// One drained interval of traffic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficSnapshot {
    pub observed_rps: f64,
    pub rejected_rate: f64,
    pub errors_5xx: u64,
}

/// Wait-free accumulators drained by the adaptive loop.
///
/// Rates are computed against wall-clock elapsed since the previous drain,
/// never against the nominal schedule interval.
pub struct TrafficStats {
    total: AtomicU64,
    rejected: AtomicU64,
    errors_5xx: AtomicU64,
    last_drain: Mutex<Instant>,
}

impl TrafficStats {
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            errors_5xx: AtomicU64::new(0),
            last_drain: Mutex::new(Instant::now()),
        }
    }

    /// Called from the decision hot path.
    pub fn record_decision(&self, allowed: bool, status_code: u16) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if !allowed {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        } else if (500..=599).contains(&status_code) {
            self.errors_5xx.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Discard the accumulated interval, e.g. when the adaptive loop is
    /// re-enabled mid-run and the stale window must not be reported.
    pub fn reset_snapshot_state(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.errors_5xx.store(0, Ordering::Relaxed);
        *self.last_drain.lock() = Instant::now();
    }

    pub fn snapshot_and_reset(&self, fallback_interval: Duration) -> TrafficSnapshot {
        let total = self.total.swap(0, Ordering::Relaxed);
        let rejected = self.rejected.swap(0, Ordering::Relaxed);
        let errors_5xx = self.errors_5xx.swap(0, Ordering::Relaxed);

        let now = Instant::now();
        let elapsed = {
            let mut last = self.last_drain.lock();
            let elapsed = now.duration_since(*last);
            *last = now;
            elapsed
        };

        let fallback = if fallback_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            fallback_interval
        };
        let seconds = if elapsed.is_zero() {
            fallback.as_secs_f64()
        } else {
            elapsed.as_secs_f64()
        };

        TrafficSnapshot {
            observed_rps: total as f64 / seconds,
            rejected_rate: if total == 0 { 0.0 } else { rejected as f64 / total as f64 },
            errors_5xx,
        }
    }
}

impl Default for TrafficStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded buffer of recent request latencies; p95 is computed on demand
/// for the advisor payload.
pub struct LatencyWindow {
    samples: Mutex<VecDeque<f64>>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self { samples: Mutex::new(VecDeque::with_capacity(capacity)), capacity: capacity.max(1) }
    }

    pub fn record(&self, seconds: f64) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(seconds);
    }

    pub fn p95(&self) -> f64 {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = ((sorted.len() as f64) * 0.95).ceil() as usize;
        sorted[rank.clamp(1, sorted.len()) - 1]
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(1024)
    }
}
