//! Adaptive reconfiguration loop.
//!
//! Every tick: drain telemetry, post it to the external advisor, and apply
//! the recommendation through the config store. Every failure class keeps
//! the current limits; the loop never escalates an advisor problem into a
//! limiter outage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use ratelab_types::{AdvisorRequest, LimitConfigPayload};

use crate::clock::epoch_millis;

use super::availability::StoreAvailability;
use super::config::ConfigStore;
use super::telemetry::{LatencyWindow, TrafficStats};

/// Runtime-togglable adaptive settings.
pub struct AdaptiveSettings {
    enabled: AtomicBool,
    url: RwLock<String>,
    pub interval: Duration,
    pub timeout: Duration,
}

impl AdaptiveSettings {
    pub fn new(enabled: bool, url: Option<String>, interval: Duration, timeout: Duration) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            url: RwLock::new(url.unwrap_or_default()),
            interval,
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn url(&self) -> String {
        self.url.read().clone()
    }

    pub fn set_url(&self, url: Option<String>) {
        if let Some(url) = url {
            *self.url.write() = url;
        }
    }
}

/// Everything one adaptive tick needs.
pub struct AdaptiveContext {
    pub settings: Arc<AdaptiveSettings>,
    pub config: Arc<ConfigStore>,
    pub traffic: Arc<TrafficStats>,
    pub latency: Arc<LatencyWindow>,
    pub availability: Arc<StoreAvailability>,
    pub http: reqwest::Client,
}

pub fn start_adaptive_loop(ctx: AdaptiveContext) {
    tokio::spawn(async move {
        tracing::info!("[Adaptive] loop started");
        let mut was_enabled = ctx.settings.is_enabled();
        let mut ticker = tokio::time::interval(ctx.settings.interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let enabled = ctx.settings.is_enabled();
            let previously = was_enabled;
            was_enabled = enabled;
            if !enabled {
                continue;
            }
            if !previously {
                // the accumulated window predates the enable; drop it
                ctx.traffic.reset_snapshot_state();
                tracing::info!("[Adaptive] adaptive mode enabled, resetting traffic snapshot");
                continue;
            }
            run_tick(&ctx).await;
        }
    });
}

async fn run_tick(ctx: &AdaptiveContext) {
    if !ctx.availability.is_available() {
        tracing::warn!("[Adaptive] store unavailable, skipping adaptive config update");
        return;
    }
    let url = ctx.settings.url();
    if url.trim().is_empty() {
        tracing::warn!("[Adaptive] adaptive mode enabled but advisor url is empty");
        return;
    }

    let snapshot = ctx.traffic.snapshot_and_reset(ctx.settings.interval);
    let config = ctx.config.current();
    let request = AdvisorRequest::new(
        epoch_millis(),
        snapshot.observed_rps,
        snapshot.rejected_rate,
        ctx.latency.p95(),
        snapshot.errors_5xx,
        &config,
    );

    tracing::info!(
        url = %url,
        interval_ms = ctx.settings.interval.as_millis() as u64,
        "[Adaptive] posting telemetry to advisor"
    );

    let response = match ctx
        .http
        .post(url.as_str())
        .timeout(ctx.settings.timeout)
        .json(&request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "[Adaptive] advisor unreachable, continuing with last limits");
            return;
        }
    };
    if !response.status().is_success() {
        tracing::warn!(
            status = response.status().as_u16(),
            "[Adaptive] advisor answered with an error status, continuing with last limits"
        );
        return;
    }
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "[Adaptive] failed to read advisor response");
            return;
        }
    };
    if body.is_empty() {
        tracing::warn!("[Adaptive] advisor returned empty response");
        return;
    }
    let payload: LimitConfigPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "[Adaptive] advisor returned invalid response");
            return;
        }
    };
    if let Err(e) = ctx.config.apply(payload, "adaptive", true).await {
        tracing::warn!(error = %e, "[Adaptive] advisor provided invalid config");
    }
}
