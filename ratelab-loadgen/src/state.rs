//! Application state for the load generator.

use std::sync::Arc;

use ratelab_core::loadtest::{LoadMetrics, LoadTestManager, LoadgenSettings};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub manager: LoadTestManager,
}

impl AppState {
    pub fn new(settings: LoadgenSettings) -> Self {
        let manager = LoadTestManager::new(settings, LoadMetrics::new());
        Self { inner: Arc::new(AppStateInner { manager }) }
    }
}
