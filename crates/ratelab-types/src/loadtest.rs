//! Load test request models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::duration::FlexDuration;

/// A request to start a load test.
///
/// `concurrency` bounds in-flight dispatches; absent or zero means unbounded.
/// The legacy alias `requestsPerThread` is still accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    pub target_url: String,
    pub duration: FlexDuration,
    pub profile: ProfileConfig,
    #[serde(default, alias = "requestsPerThread", skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
}

/// Tagged profile selection; `params` is decoded per `kind` when the profile
/// is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstantParams {
    pub rps: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BurstParams {
    pub base_rps: f64,
    pub spike_rps: f64,
    pub spike_duration: FlexDuration,
    pub spike_period: FlexDuration,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinusoidalParams {
    pub min_rps: f64,
    pub max_rps: f64,
    pub period: FlexDuration,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoissonParams {
    pub average_rps: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DdosParams {
    pub min_rps: f64,
    pub max_rps: f64,
    pub max_spike_duration: FlexDuration,
    pub min_idle_time: FlexDuration,
    pub max_idle_time: FlexDuration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_config_parses_full_request() {
        let config: TestConfig = serde_json::from_str(
            r#"{
                "targetUrl": "http://localhost:8090/api",
                "duration": "30s",
                "profile": {"type": "constant", "params": {"rps": 25}},
                "concurrency": 8
            }"#,
        )
        .unwrap();
        assert_eq!(config.target_url, "http://localhost:8090/api");
        assert_eq!(config.duration.0, Duration::from_secs(30));
        assert_eq!(config.profile.kind, "constant");
        assert_eq!(config.concurrency, Some(8));
    }

    #[test]
    fn test_config_accepts_legacy_concurrency_alias() {
        let config: TestConfig = serde_json::from_str(
            r#"{
                "targetUrl": "http://localhost:8090",
                "duration": 10,
                "profile": {"type": "poisson", "params": {"averageRps": 5}},
                "requestsPerThread": 4
            }"#,
        )
        .unwrap();
        assert_eq!(config.concurrency, Some(4));
    }

    #[test]
    fn ddos_params_parse_durations() {
        let params: DdosParams = serde_json::from_str(
            r#"{
                "minRps": 10,
                "maxRps": 80,
                "maxSpikeDuration": "2s",
                "minIdleTime": 0,
                "maxIdleTime": "PT1S"
            }"#,
        )
        .unwrap();
        assert_eq!(params.max_spike_duration.0, Duration::from_secs(2));
        assert_eq!(params.min_idle_time.0, Duration::ZERO);
        assert_eq!(params.max_idle_time.0, Duration::from_secs(1));
    }
}
