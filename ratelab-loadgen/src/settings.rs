//! Environment-driven settings for the load generator.

use std::time::Duration;

use ratelab_core::loadtest::{LoadgenSettings, SchedulerKind};
use ratelab_types::FlexDuration;

const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub config_file: Option<String>,
    pub loadgen: LoadgenSettings,
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = LoadgenSettings::default();
        let loadgen = LoadgenSettings {
            scheduler: env_parsed("LOADGEN_SCHEDULER", defaults.scheduler, |raw| {
                raw.parse::<SchedulerKind>().ok()
            }),
            tick: env_duration("LOADGEN_TICK", defaults.tick),
            idle_delay: env_duration("LOADGEN_IDLE_DELAY", defaults.idle_delay),
            log_interval: env_duration("LOADGEN_LOG_INTERVAL", defaults.log_interval),
            http_timeout: env_duration("LOADGEN_HTTP_TIMEOUT", defaults.http_timeout),
            connect_timeout: env_duration("LOADGEN_CONNECT_TIMEOUT", defaults.connect_timeout),
            slow_threshold: env_duration("LOADGEN_SLOW_THRESHOLD", defaults.slow_threshold),
        };
        Self {
            port: env_parsed("LOADGEN_PORT", DEFAULT_PORT, |raw| raw.parse().ok()),
            config_file: std::env::var("LOADGEN_CONFIG_FILE").ok().filter(|v| !v.is_empty()),
            loadgen,
        }
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
