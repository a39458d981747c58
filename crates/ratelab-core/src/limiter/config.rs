//! Limiter configuration store.
//!
//! Holds the current `LimitConfig` behind an atomic reference so the
//! decision hot path is a single lock-free load. Applies merge partial
//! payloads, validate against operator bounds, trigger the state reset on
//! algorithm transitions, and persist the result to the shared store best
//! effort. A periodic refresh picks up configs written by other replicas.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use metrics::gauge;
use ratelab_types::{Algorithm, Bounds, LimitConfig, LimitConfigPayload};

use crate::error::{CoreError, CoreResult};
use crate::store::Store;

use super::reset::reset_algorithm_state;
use super::CONFIG_KEY;

pub struct ConfigStore {
    current: ArcSwap<LimitConfig>,
    bounds: Bounds,
    store: Arc<Store>,
}

impl ConfigStore {
    pub fn new(defaults: LimitConfig, bounds: Bounds, store: Arc<Store>) -> Self {
        update_config_gauges(&defaults);
        Self { current: ArcSwap::from_pointee(defaults), bounds, store }
    }

    /// Lock-free load of the current config.
    pub fn current(&self) -> Arc<LimitConfig> {
        self.current.load_full()
    }

    /// Merge `payload` onto the current config, validate, reset state on an
    /// algorithm change, swap, and persist.
    pub async fn apply(
        &self,
        payload: LimitConfigPayload,
        source: &str,
        require_all_fields: bool,
    ) -> CoreResult<LimitConfig> {
        let base = *self.current();
        let updated = self.resolve(&payload, &base, require_all_fields)?;

        if base.algorithm != updated.algorithm {
            reset_algorithm_state(&self.store).await;
            tracing::info!(
                from = %base.algorithm,
                to = %updated.algorithm,
                source = source,
                "Switched rate-limiting algorithm"
            );
        }

        self.persist(&updated).await;
        self.current.store(Arc::new(updated));
        update_config_gauges(&updated);
        tracing::info!(
            source = source,
            algorithm = %updated.algorithm,
            limit = updated.limit,
            window_s = updated.window_seconds,
            capacity = updated.capacity,
            fill_rate = updated.fill_rate,
            "Applied rate limiter config"
        );
        Ok(updated)
    }

    pub async fn apply_algorithm(&self, algorithm: Algorithm) -> CoreResult<LimitConfig> {
        let payload = LimitConfigPayload { algorithm: Some(algorithm), ..Default::default() };
        self.apply(payload, "api", false).await
    }

    /// Startup load of a previously persisted config; any failure keeps the
    /// defaults.
    pub async fn load_from_store(&self) {
        match self.read_persisted().await {
            Ok(Some(payload)) => {
                let base = *self.current();
                match self.resolve(&payload, &base, false) {
                    Ok(loaded) => {
                        self.current.store(Arc::new(loaded));
                        update_config_gauges(&loaded);
                        tracing::info!(
                            algorithm = %loaded.algorithm,
                            limit = loaded.limit,
                            window_s = loaded.window_seconds,
                            capacity = loaded.capacity,
                            fill_rate = loaded.fill_rate,
                            "Loaded rate limiter config from store"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Persisted config is invalid, using defaults");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load config from store, using defaults");
            }
        }
    }

    /// One refresh pass: adopt the persisted config when it differs from the
    /// current one, treating it as an externally applied change.
    pub async fn refresh_from_store(&self) {
        let payload = match self.read_persisted().await {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh config from store");
                return;
            }
        };
        let base = *self.current();
        let loaded = match self.resolve(&payload, &base, false) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::warn!(error = %e, "Refreshed config is invalid, keeping current");
                return;
            }
        };
        if loaded == base {
            return;
        }
        if base.algorithm != loaded.algorithm {
            reset_algorithm_state(&self.store).await;
            tracing::info!(
                from = %base.algorithm,
                to = %loaded.algorithm,
                source = "store",
                "Switched rate-limiting algorithm"
            );
        }
        self.current.store(Arc::new(loaded));
        update_config_gauges(&loaded);
        tracing::info!(
            algorithm = %loaded.algorithm,
            limit = loaded.limit,
            window_s = loaded.window_seconds,
            capacity = loaded.capacity,
            fill_rate = loaded.fill_rate,
            "Refreshed rate limiter config from store"
        );
    }

    fn resolve(
        &self,
        payload: &LimitConfigPayload,
        base: &LimitConfig,
        require_all_fields: bool,
    ) -> CoreResult<LimitConfig> {
        let algorithm = payload.algorithm.unwrap_or(base.algorithm);

        if require_all_fields {
            match algorithm {
                Algorithm::Fixed | Algorithm::Sliding => {
                    if payload.limit.is_none() || payload.window.is_none() {
                        return Err(CoreError::invalid(
                            "limit and window are required for fixed/sliding algorithms",
                        ));
                    }
                }
                Algorithm::Token => {
                    if payload.capacity.is_none() || payload.fill_rate.is_none() {
                        return Err(CoreError::invalid(
                            "capacity and fillRate are required for token algorithm",
                        ));
                    }
                }
            }
        }

        let candidate = LimitConfig {
            algorithm,
            limit: payload.limit.unwrap_or(base.limit),
            window_seconds: payload.window.unwrap_or(base.window_seconds),
            capacity: payload.capacity.unwrap_or(base.capacity),
            fill_rate: payload.fill_rate.unwrap_or(base.fill_rate),
        };
        self.validate_and_clamp(candidate)
    }

    fn validate_and_clamp(&self, candidate: LimitConfig) -> CoreResult<LimitConfig> {
        let bounds = &self.bounds;
        Ok(LimitConfig {
            algorithm: candidate.algorithm,
            limit: clamp_u64(candidate.limit, bounds.min_limit, bounds.max_limit, "limit")?,
            window_seconds: clamp_u64(
                candidate.window_seconds,
                bounds.min_window_seconds,
                bounds.max_window_seconds,
                "window",
            )?,
            capacity: clamp_u64(
                candidate.capacity,
                bounds.min_capacity,
                bounds.max_capacity,
                "capacity",
            )?,
            fill_rate: clamp_f64(
                candidate.fill_rate,
                bounds.min_fill_rate,
                bounds.max_fill_rate,
                "fillRate",
            )?,
        })
    }

    /// Best effort; persistence failures are logged and swallowed.
    async fn persist(&self, config: &LimitConfig) {
        let json = match serde_json::to_string(&config.to_payload()) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize config for persistence");
                return;
            }
        };
        let result: CoreResult<()> = async {
            let mut conn = self.store.connection().await?;
            let _: () = redis::cmd("SET").arg(CONFIG_KEY).arg(json).query_async(&mut conn).await?;
            Ok(())
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist config in store");
        }
    }

    async fn read_persisted(&self) -> CoreResult<Option<LimitConfigPayload>> {
        let mut conn = self.store.connection().await?;
        let json: Option<String> =
            redis::cmd("GET").arg(CONFIG_KEY).query_async(&mut conn).await?;
        let Some(json) = json.filter(|j| !j.trim().is_empty()) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json)?))
    }
}

/// Below-minimum is rejected; above-maximum is clamped with a warning. A
/// maximum of zero disables the upper clamp.
fn clamp_u64(value: u64, min: u64, max: u64, name: &str) -> CoreResult<u64> {
    if value < min {
        return Err(CoreError::invalid(format!("{name} must be >= {min}")));
    }
    if max > 0 && value > max {
        tracing::warn!(field = name, value, max, "Config value capped at maximum");
        return Ok(max);
    }
    Ok(value)
}

fn clamp_f64(value: f64, min: f64, max: f64, name: &str) -> CoreResult<f64> {
    if value < min {
        return Err(CoreError::invalid(format!("{name} must be >= {min}")));
    }
    if max > 0.0 && value > max {
        tracing::warn!(field = name, value, max, "Config value capped at maximum");
        return Ok(max);
    }
    Ok(value)
}

fn update_config_gauges(config: &LimitConfig) {
    gauge!("ratelimiter_current_limit").set(config.limit as f64);
    gauge!("ratelimiter_window_seconds").set(config.window_seconds as f64);
    gauge!("ratelimiter_bucket_capacity").set(config.capacity as f64);
    gauge!("ratelimiter_token_fill_rate").set(config.fill_rate);
}

/// Periodically adopt configs persisted by other replicas.
pub fn start_refresh_loop(config: Arc<ConfigStore>, interval: Duration) {
    tokio::spawn(async move {
        tracing::info!("[ConfigRefresh] refresh loop started");
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            config.refresh_from_store().await;
        }
    });
}
