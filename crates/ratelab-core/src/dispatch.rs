//! Outbound request dispatch for the load generator.
//!
//! A thin send abstraction over a shared HTTP client: one GET per dispatch,
//! an optional bounded concurrency cap, and success / rate-limited / error
//! classification fed into [`LoadMetrics`]. Dispatches run on their own
//! tasks so the scheduler's timing is never coupled to response latency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::loadtest::LoadMetrics;
use crate::scheduler::RequestSender;

/// Build the process-wide outbound HTTP client.
pub fn build_http_client(connect_timeout: Duration, timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub struct HttpSender {
    client: reqwest::Client,
    target: reqwest::Url,
    metrics: Arc<LoadMetrics>,
    slow_threshold: Duration,
    semaphore: Option<Arc<Semaphore>>,
    stopped: AtomicBool,
}

impl HttpSender {
    pub fn new(
        client: reqwest::Client,
        target: reqwest::Url,
        metrics: Arc<LoadMetrics>,
        slow_threshold: Duration,
        concurrency: Option<u32>,
    ) -> Self {
        let semaphore = concurrency
            .filter(|&n| n > 0)
            .map(|n| Arc::new(Semaphore::new(n as usize)));
        Self { client, target, metrics, slow_threshold, semaphore, stopped: AtomicBool::new(false) }
    }

    /// Drop all further dispatches; in-flight requests complete normally.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RequestSender for HttpSender {
    async fn send(&self) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let permit = match &self.semaphore {
            Some(semaphore) => match Arc::clone(semaphore).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return,
            },
            None => None,
        };

        let run_id = self.metrics.current_run_id();
        self.metrics.record_request_start(run_id);

        let client = self.client.clone();
        let target = self.target.clone();
        let metrics = Arc::clone(&self.metrics);
        let slow_threshold = self.slow_threshold;
        tokio::spawn(async move {
            let _permit = permit;
            let started = Instant::now();
            match client.get(target.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    // drain so the connection goes back to the pool
                    let _ = response.bytes().await;
                    let elapsed = started.elapsed();
                    log_slow(&target, slow_threshold, Some(status), elapsed);
                    if status.is_success() {
                        metrics.record_request_success(run_id, elapsed);
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        metrics.record_request_rate_limited(run_id, elapsed);
                    } else {
                        tracing::error!(
                            target_url = %target,
                            status = status.as_u16(),
                            duration_ms = elapsed.as_millis() as u64,
                            "Request error"
                        );
                        metrics.record_request_error(run_id, elapsed);
                    }
                }
                Err(e) => {
                    let elapsed = started.elapsed();
                    tracing::error!(target_url = %target, error = %e, "Request error");
                    log_slow(&target, slow_threshold, None, elapsed);
                    metrics.record_request_error(run_id, elapsed);
                }
            }
        });
    }
}

fn log_slow(
    target: &reqwest::Url,
    slow_threshold: Duration,
    status: Option<StatusCode>,
    elapsed: Duration,
) {
    if slow_threshold.is_zero() || elapsed < slow_threshold {
        return;
    }
    let status = status.map_or_else(|| "n/a".to_string(), |s| s.as_u16().to_string());
    tracing::warn!(
        target_url = %target,
        status = %status,
        duration_ms = elapsed.as_millis() as u64,
        "Slow response"
    );
}
