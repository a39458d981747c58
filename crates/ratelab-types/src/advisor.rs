//! Payload posted to the external advisor each adaptive tick.

use serde::{Deserialize, Serialize};

use crate::limit::{Algorithm, LimitConfig};

/// Telemetry snapshot plus the config it was collected under.
///
/// The advisor replies with a `LimitConfigPayload`; an empty body means
/// "no recommendation".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorRequest {
    /// Epoch milliseconds at snapshot time.
    pub timestamp: i64,
    pub observed_rps: f64,
    pub rejected_rate: f64,
    pub latency_p95: f64,
    pub errors_5xx: u64,
    pub algorithm: Algorithm,
    pub limit: u64,
    pub window: u64,
    pub capacity: u64,
    pub fill_rate: f64,
}

impl AdvisorRequest {
    pub fn new(
        timestamp: i64,
        observed_rps: f64,
        rejected_rate: f64,
        latency_p95: f64,
        errors_5xx: u64,
        config: &LimitConfig,
    ) -> Self {
        Self {
            timestamp,
            observed_rps,
            rejected_rate,
            latency_p95,
            errors_5xx,
            algorithm: config.algorithm,
            limit: config.limit,
            window: config.window_seconds,
            capacity: config.capacity,
            fill_rate: config.fill_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_flat_camel_case_fields() {
        let config = LimitConfig {
            algorithm: Algorithm::Fixed,
            limit: 100,
            window_seconds: 60,
            capacity: 100,
            fill_rate: 10.0,
        };
        let request = AdvisorRequest::new(1_700_000_000_000, 42.5, 0.125, 0.08, 3, &config);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["observedRps"], 42.5);
        assert_eq!(json["rejectedRate"], 0.125);
        assert_eq!(json["latencyP95"], 0.08);
        assert_eq!(json["errors5xx"], 3);
        assert_eq!(json["algorithm"], "fixed");
        assert_eq!(json["window"], 60);
        assert_eq!(json["fillRate"], 10.0);
    }
}
