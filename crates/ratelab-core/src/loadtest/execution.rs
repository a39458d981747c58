//! A single running (or finished) load test.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ratelab_types::TestConfig;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::dispatch::HttpSender;
use crate::profile::LoadProfile;
use crate::scheduler::Completion;

use super::{AnyScheduler, LoadMetrics};

pub struct TestExecution {
    test_id: String,
    config: TestConfig,
    profile: Arc<LoadProfile>,
    scheduler: AnyScheduler,
    sender: Arc<HttpSender>,
    metrics: Arc<LoadMetrics>,
    log_interval: Duration,
    base_sent: u64,
    base_errors: u64,
    running: AtomicBool,
    start_time: Mutex<Option<Instant>>,
    end_time: Mutex<Option<Instant>>,
    log_cancel: CancellationToken,
}

impl std::fmt::Debug for TestExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestExecution")
            .field("test_id", &self.test_id)
            .field("config", &self.config)
            .field("log_interval", &self.log_interval)
            .field("base_sent", &self.base_sent)
            .field("base_errors", &self.base_errors)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl TestExecution {
    pub(crate) fn new(
        test_id: String,
        config: TestConfig,
        profile: Arc<LoadProfile>,
        scheduler: AnyScheduler,
        sender: Arc<HttpSender>,
        metrics: Arc<LoadMetrics>,
        log_interval: Duration,
    ) -> Self {
        let base_sent = metrics.total_sent();
        let base_errors = metrics.total_errors();
        Self {
            test_id,
            config,
            profile,
            scheduler,
            sender,
            metrics,
            log_interval,
            base_sent,
            base_errors,
            running: AtomicBool::new(false),
            start_time: Mutex::new(None),
            end_time: Mutex::new(None),
            log_cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        *self.start_time.lock() = Some(now);
        self.metrics.set_test_running(true);
        self.start_progress_logger();
        self.scheduler.start(now);

        let execution = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = execution.scheduler.completion().wait().await;
            execution.running.store(false, Ordering::SeqCst);
            *execution.end_time.lock() = Some(Instant::now());
            execution.metrics.set_test_running(false);
            execution.log_cancel.cancel();
            execution.sender.stop();
            match outcome {
                Ok(()) => tracing::info!(
                    test_id = %execution.test_id,
                    sent = execution.requests_sent(),
                    errors = execution.errors(),
                    elapsed_s = execution.elapsed().as_secs(),
                    "Load test completed"
                ),
                Err(e) => tracing::error!(
                    test_id = %execution.test_id,
                    error = %e,
                    "Load test failed"
                ),
            }
        });
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    pub fn profile_name(&self) -> &'static str {
        self.profile.name()
    }

    pub fn completion(&self) -> Completion {
        self.scheduler.completion()
    }

    pub fn elapsed(&self) -> Duration {
        let Some(start) = *self.start_time.lock() else {
            return Duration::ZERO;
        };
        if self.is_running() {
            return start.elapsed();
        }
        match *self.end_time.lock() {
            Some(end) => end.duration_since(start),
            None => start.elapsed(),
        }
    }

    /// Requests sent since this test's baseline.
    pub fn requests_sent(&self) -> u64 {
        self.metrics.total_sent().saturating_sub(self.base_sent)
    }

    /// Errors since this test's baseline.
    pub fn errors(&self) -> u64 {
        self.metrics.total_errors().saturating_sub(self.base_errors)
    }

    fn start_progress_logger(self: &Arc<Self>) {
        if self.log_interval.is_zero() {
            return;
        }
        let execution = Arc::clone(self);
        let cancel = self.log_cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(execution.log_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if !execution.is_running() {
                            break;
                        }
                        tracing::info!(
                            test_id = %execution.test_id,
                            sent = execution.requests_sent(),
                            errors = execution.errors(),
                            current_rps = execution.metrics.current_rps(),
                            elapsed_s = execution.elapsed().as_secs(),
                            "Load test progress"
                        );
                    }
                }
            }
        });
    }
}
