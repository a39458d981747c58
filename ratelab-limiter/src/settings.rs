//! Environment-driven settings for the limiter.

use std::time::Duration;

use ratelab_core::store::StoreSettings;
use ratelab_types::{Algorithm, Bounds, FlexDuration, LimitConfig};

const DEFAULT_PORT: u16 = 8090;
const DEFAULT_TARGET_URL: &str = "http://localhost:8081";

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub target_url: String,
    pub defaults: LimitConfig,
    pub bounds: Bounds,
    pub fail_open: bool,
    pub store: StoreSettings,
    pub health_interval: Duration,
    pub refresh_interval: Duration,
    pub adaptive_enabled: bool,
    pub adaptive_url: Option<String>,
    pub adaptive_interval: Duration,
    pub adaptive_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Self {
        let bounds = Bounds {
            min_limit: env_parsed("RATE_LIMIT_MIN_LIMIT", 1, parse_u64),
            max_limit: env_parsed("RATE_LIMIT_MAX_LIMIT", 1_000_000, parse_u64),
            min_window_seconds: env_parsed("RATE_LIMIT_MIN_WINDOW_SECONDS", 1, parse_u64),
            max_window_seconds: env_parsed("RATE_LIMIT_MAX_WINDOW_SECONDS", 3600, parse_u64),
            min_capacity: env_parsed("RATE_LIMIT_MIN_CAPACITY", 1, parse_u64),
            max_capacity: env_parsed("RATE_LIMIT_MAX_CAPACITY", 1_000_000, parse_u64),
            min_fill_rate: env_parsed("RATE_LIMIT_MIN_FILL_RATE", 0.1, parse_f64),
            max_fill_rate: env_parsed("RATE_LIMIT_MAX_FILL_RATE", 1_000_000.0, parse_f64),
        };
        let defaults = LimitConfig {
            algorithm: env_parsed("RATE_LIMIT_ALGORITHM", Algorithm::Fixed, |raw| {
                raw.parse::<Algorithm>().ok()
            }),
            limit: env_parsed("RATE_LIMIT_LIMIT", 100, parse_u64),
            window_seconds: env_parsed("RATE_LIMIT_WINDOW_SECONDS", 60, parse_u64),
            capacity: env_parsed("RATE_LIMIT_CAPACITY", 100, parse_u64),
            fill_rate: env_parsed("RATE_LIMIT_FILL_RATE", 10.0, parse_f64),
        };
        Self {
            port: env_parsed("LIMITER_PORT", DEFAULT_PORT, |raw| raw.parse().ok()),
            target_url: std::env::var("TARGET_URL")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_TARGET_URL.to_string()),
            defaults,
            bounds,
            fail_open: env_parsed("RATE_LIMIT_FAIL_OPEN", true, parse_bool),
            store: StoreSettings {
                host: std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: env_parsed("REDIS_PORT", 6379, |raw| raw.parse().ok()),
            },
            health_interval: env_duration("REDIS_HEALTH_INTERVAL", Duration::from_secs(5)),
            refresh_interval: env_duration("CONFIG_REFRESH_INTERVAL", Duration::from_secs(30)),
            adaptive_enabled: env_parsed("ADAPTIVE_ENABLED", false, parse_bool),
            adaptive_url: std::env::var("ADAPTIVE_URL").ok().filter(|v| !v.is_empty()),
            adaptive_interval: env_duration("ADAPTIVE_INTERVAL", Duration::from_secs(30)),
            adaptive_timeout: env_duration("ADAPTIVE_TIMEOUT", Duration::from_secs(5)),
        }
    }
}

fn parse_u64(raw: &str) -> Option<u64> {
    raw.parse().ok()
}

fn parse_f64(raw: &str) -> Option<f64> {
    raw.parse().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn env_parsed<T>(key: &str, default: T, parse: impl Fn(&str) -> Option<T>) -> T {
    match std::env::var(key) {
        Ok(raw) => match parse(&raw) {
            Some(value) => value,
            None => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable environment value");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_duration(key: &str, default: Duration) -> Duration {
    env_parsed(key, default, |raw| FlexDuration::parse(raw).ok())
}
