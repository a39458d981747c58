//! Fail-open guard: the liveness latch and its periodic health probe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};

use crate::store::Store;

/// Boolean latch owned by the health probe; read lock-free on the decision
/// hot path. Transitions are logged once per edge.
pub struct StoreAvailability {
    available: AtomicBool,
}

impl StoreAvailability {
    pub fn new() -> Self {
        gauge!("ratelimiter_store_connected").set(1.0);
        gauge!("ratelimiter_mode", "type" => "failopen").set(0.0);
        Self { available: AtomicBool::new(true) }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    pub fn mark_unavailable(&self, reason: &str) {
        if self
            .available
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::warn!(reason = %reason, "Store connection lost, entering fail-open mode");
            gauge!("ratelimiter_store_connected").set(0.0);
            gauge!("ratelimiter_mode", "type" => "failopen").set(1.0);
        }
    }

    pub fn mark_available(&self) {
        if self
            .available
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("Store reconnected, resuming normal operation");
            gauge!("ratelimiter_store_connected").set(1.0);
            gauge!("ratelimiter_mode", "type" => "failopen").set(0.0);
        }
    }
}

impl Default for StoreAvailability {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic PING against the store. On failure the latch flips to
/// unavailable and the managed connection is dropped so the next probe (or
/// decision) reconnects from scratch.
pub fn start_health_checker(
    store: Arc<Store>,
    availability: Arc<StoreAvailability>,
    interval: Duration,
) {
    tokio::spawn(async move {
        tracing::info!("[StoreHealth] health checker started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match store.ping().await {
                Ok(()) => availability.mark_available(),
                Err(e) => {
                    counter!("ratelimiter_store_errors_total").increment(1);
                    availability.mark_unavailable(&e.to_string());
                    store.reset().await;
                }
            }
        }
    });
}

#[cfg(test)]
mod availability_tests {
    use super::*;

    #[test]
    fn latch_transitions_are_edge_triggered() {
        let latch = StoreAvailability::new();
        assert!(latch.is_available());

        latch.mark_unavailable("probe timeout");
        assert!(!latch.is_available());
        // second mark is a no-op, not a second transition
        latch.mark_unavailable("probe timeout");
        assert!(!latch.is_available());

        latch.mark_available();
        assert!(latch.is_available());
        latch.mark_available();
        assert!(latch.is_available());
    }
}
