//! Rate-limiting engine: admission decisions, fail-open guard, config
//! store, state reset, telemetry, and the adaptive reconfiguration loop.

pub mod adaptive;
pub mod availability;
pub mod config;
pub mod engine;
pub mod reset;
pub mod telemetry;


pub use adaptive::{start_adaptive_loop, AdaptiveContext, AdaptiveSettings};
pub use availability::{start_health_checker, StoreAvailability};
pub use config::{start_refresh_loop, ConfigStore};
pub use engine::StoreRateLimiter;
pub use telemetry::{LatencyWindow, TrafficSnapshot, TrafficStats};

/// Key families in the shared store.
pub const CONFIG_KEY: &str = "ratelimiter:config";
pub const FIXED_KEY_PREFIX: &str = "ratelimiter:fixed:";
pub const SLIDING_KEY_PREFIX: &str = "ratelimiter:sliding:";
pub const TOKEN_KEY: &str = "ratelimiter:token";
