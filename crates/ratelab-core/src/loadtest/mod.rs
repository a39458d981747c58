//! Load test lifecycle: manager, execution state, and per-test metrics.

mod execution;
mod metrics;

#[cfg(test)]
mod tests;

pub use execution::TestExecution;
pub use metrics::LoadMetrics;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use ratelab_types::TestConfig;
use tokio::time::Instant;

use crate::dispatch::{build_http_client, HttpSender};
use crate::error::{CoreError, CoreResult};
use crate::profile::{build_profile, LoadProfile};
use crate::scheduler::{Completion, IntervalScheduler, TickScheduler};

/// Which scheduler realization the manager constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Interval,
    Tick,
}

impl FromStr for SchedulerKind {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "interval" => Ok(SchedulerKind::Interval),
            "tick" => Ok(SchedulerKind::Tick),
            other => Err(CoreError::invalid(format!("Unsupported scheduler: {other}"))),
        }
    }
}

/// Operator settings for the load generator.
#[derive(Debug, Clone)]
pub struct LoadgenSettings {
    pub scheduler: SchedulerKind,
    pub tick: Duration,
    pub idle_delay: Duration,
    pub log_interval: Duration,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub slow_threshold: Duration,
}

impl Default for LoadgenSettings {
    fn default() -> Self {
        Self {
            scheduler: SchedulerKind::Interval,
            tick: Duration::from_millis(100),
            idle_delay: Duration::from_millis(100),
            log_interval: Duration::from_secs(10),
            http_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            slow_threshold: Duration::from_secs(1),
        }
    }
}

/// Either scheduler realization behind one start/stop surface.
pub(crate) enum AnyScheduler {
    Interval(IntervalScheduler),
    Tick(TickScheduler),
}

impl AnyScheduler {
    pub(crate) fn start(&self, start: Instant) {
        match self {
            AnyScheduler::Interval(s) => s.start(start),
            AnyScheduler::Tick(s) => s.start(start),
        }
    }

    pub(crate) fn stop(&self) {
        match self {
            AnyScheduler::Interval(s) => s.stop(),
            AnyScheduler::Tick(s) => s.stop(),
        }
    }

    pub(crate) fn completion(&self) -> Completion {
        match self {
            AnyScheduler::Interval(s) => s.completion(),
            AnyScheduler::Tick(s) => s.completion(),
        }
    }
}

/// Owns the single running test; exactly one may run at a time.
pub struct LoadTestManager {
    settings: LoadgenSettings,
    client: reqwest::Client,
    metrics: Arc<LoadMetrics>,
    current: Mutex<Option<Arc<TestExecution>>>,
}

impl LoadTestManager {
    pub fn new(settings: LoadgenSettings, metrics: Arc<LoadMetrics>) -> Self {
        let client = build_http_client(settings.connect_timeout, settings.http_timeout);
        Self { settings, client, metrics, current: Mutex::new(None) }
    }

    pub fn metrics(&self) -> Arc<LoadMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Start a test; `409` material when one is already running.
    pub fn start(&self, config: TestConfig) -> CoreResult<Arc<TestExecution>> {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|e| e.is_running()) {
            return Err(CoreError::TestAlreadyRunning);
        }

        let target = validate_target_url(&config.target_url)?;
        if config.duration.0.is_zero() {
            return Err(CoreError::invalid("duration must be > 0"));
        }
        if config.concurrency == Some(0) {
            return Err(CoreError::invalid("concurrency must be > 0"));
        }
        let profile = Arc::new(build_profile(&config.profile)?);

        self.metrics.reset_for_new_test();
        let sender = Arc::new(HttpSender::new(
            self.client.clone(),
            target,
            self.metrics.clone(),
            self.settings.slow_threshold,
            config.concurrency,
        ));
        let scheduler = self.build_scheduler(&config, Arc::clone(&profile), Arc::clone(&sender));

        let test_id = random_test_id();
        let execution = Arc::new(TestExecution::new(
            test_id.clone(),
            config,
            Arc::clone(&profile),
            scheduler,
            sender,
            self.metrics.clone(),
            self.settings.log_interval,
        ));
        *current = Some(Arc::clone(&execution));
        drop(current);

        tracing::info!(
            test_id = %test_id,
            profile = profile.name(),
            target_url = %execution.config().target_url,
            duration_s = execution.config().duration.0.as_secs(),
            "Starting load test"
        );
        execution.start();
        Ok(execution)
    }

    /// Stop the running test; `404` material when nothing is running.
    pub fn stop(&self) -> CoreResult<Arc<TestExecution>> {
        let current = self.current.lock();
        let execution = current
            .as_ref()
            .filter(|e| e.is_running())
            .cloned()
            .ok_or(CoreError::TestNotRunning)?;
        drop(current);
        tracing::info!(test_id = %execution.test_id(), "Stopping load test");
        execution.stop();
        Ok(execution)
    }

    pub fn current(&self) -> Option<Arc<TestExecution>> {
        self.current.lock().clone()
    }

    fn build_scheduler(
        &self,
        config: &TestConfig,
        profile: Arc<LoadProfile>,
        sender: Arc<HttpSender>,
    ) -> AnyScheduler {
        match self.settings.scheduler {
            SchedulerKind::Interval => AnyScheduler::Interval(IntervalScheduler::new(
                config.duration.0,
                self.settings.idle_delay,
                profile,
                sender,
            )),
            SchedulerKind::Tick => AnyScheduler::Tick(TickScheduler::new(
                config.duration.0,
                self.settings.tick,
                profile,
                sender,
            )),
        }
    }
}

fn validate_target_url(raw: &str) -> CoreResult<reqwest::Url> {
    let url = reqwest::Url::parse(raw)
        .map_err(|e| CoreError::invalid(format!("Invalid targetUrl: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CoreError::invalid("targetUrl scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(CoreError::invalid("targetUrl must include a host"));
    }
    Ok(url)
}

fn random_test_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect::<String>()
        .to_ascii_lowercase()
}
