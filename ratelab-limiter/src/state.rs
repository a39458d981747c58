//! Application state for the limiter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use ratelab_core::limiter::{
    AdaptiveSettings, ConfigStore, LatencyWindow, StoreAvailability, StoreRateLimiter,
    TrafficStats,
};
use ratelab_core::store::Store;

use crate::settings::Settings;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub store: Arc<Store>,
    pub availability: Arc<StoreAvailability>,
    pub limiter: Arc<StoreRateLimiter>,
    pub config: Arc<ConfigStore>,
    pub traffic: Arc<TrafficStats>,
    pub latency: Arc<LatencyWindow>,
    pub adaptive: Arc<AdaptiveSettings>,
    pub target_url: String,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(settings: &Settings) -> Result<Self> {
        let store = Arc::new(Store::new(&settings.store)?);
        let availability = Arc::new(StoreAvailability::new());
        let limiter = Arc::new(StoreRateLimiter::new(
            Arc::clone(&store),
            Arc::clone(&availability),
            settings.fail_open,
        ));
        let config = Arc::new(ConfigStore::new(
            settings.defaults,
            settings.bounds,
            Arc::clone(&store),
        ));
        let adaptive = Arc::new(AdaptiveSettings::new(
            settings.adaptive_enabled,
            settings.adaptive_url.clone(),
            settings.adaptive_interval,
            settings.adaptive_timeout,
        ));
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                store,
                availability,
                limiter,
                config,
                traffic: Arc::new(TrafficStats::new()),
                latency: Arc::new(LatencyWindow::default()),
                adaptive,
                target_url: settings.target_url.clone(),
                http_client,
            }),
        })
    }
}
