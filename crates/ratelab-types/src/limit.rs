//! Rate-limiter configuration models.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The admission algorithm run by the limit decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Counter over wall-clock-aligned buckets of fixed length.
    Fixed,
    /// Weighted blend of the current and immediately previous bucket.
    Sliding,
    /// Continuously refilled token reservoir.
    Token,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Fixed, Algorithm::Sliding, Algorithm::Token];

    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Fixed => "fixed",
            Algorithm::Sliding => "sliding",
            Algorithm::Token => "token",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported algorithm: {0}")]
pub struct AlgorithmParseError(pub String);

impl FromStr for Algorithm {
    type Err = AlgorithmParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Algorithm::Fixed),
            "sliding" => Ok(Algorithm::Sliding),
            "token" | "token_bucket" | "token-bucket" => Ok(Algorithm::Token),
            _ => Err(AlgorithmParseError(value.to_string())),
        }
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// A fully resolved limiter configuration.
///
/// Immutable once built; the config store swaps whole values atomically.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitConfig {
    pub algorithm: Algorithm,
    pub limit: u64,
    pub window_seconds: u64,
    pub capacity: u64,
    pub fill_rate: f64,
}

impl LimitConfig {
    /// Wire representation with every field populated.
    pub fn to_payload(&self) -> LimitConfigPayload {
        LimitConfigPayload {
            algorithm: Some(self.algorithm),
            limit: Some(self.limit),
            window: Some(self.window_seconds),
            capacity: Some(self.capacity),
            fill_rate: Some(self.fill_rate),
        }
    }
}

/// Partial limiter configuration as it appears on the wire.
///
/// Used for operator updates, advisor responses, and the persisted copy in
/// the shared store. Missing fields inherit from the current config when
/// applied. `burst` is accepted as an alias for `capacity`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitConfigPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<Algorithm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<u64>,
    #[serde(alias = "burst", skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_rate: Option<f64>,
}

/// Operator-configured validation bounds for limiter fields.
///
/// Values below a minimum are rejected; values above a maximum are clamped
/// with a warning. A maximum of zero disables the upper clamp for that field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_limit: u64,
    pub max_limit: u64,
    pub min_window_seconds: u64,
    pub max_window_seconds: u64,
    pub min_capacity: u64,
    pub max_capacity: u64,
    pub min_fill_rate: f64,
    pub max_fill_rate: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_limit: 1,
            max_limit: 1_000_000,
            min_window_seconds: 1,
            max_window_seconds: 3600,
            min_capacity: 1,
            max_capacity: 1_000_000,
            min_fill_rate: 0.1,
            max_fill_rate: 1_000_000.0,
        }
    }
}
