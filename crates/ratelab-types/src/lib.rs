//! # Ratelab Types
//!
//! Shared value types for the ratelab services:
//!
//! - **`limit`** - rate-limiter algorithm selection, resolved configuration,
//!   partial wire payloads, and validation bounds
//! - **`loadtest`** - load test requests and per-profile parameter sets
//! - **`advisor`** - telemetry payload posted to the external advisor
//! - **`duration`** - the flexible duration grammar accepted on the wire
//!
//! This crate sits at the bottom of the dependency graph; everything here is
//! a plain serde-friendly value with no I/O.

pub mod advisor;
pub mod duration;
pub mod limit;
pub mod loadtest;

pub use advisor::AdvisorRequest;
pub use duration::{DurationParseError, FlexDuration};
pub use limit::{Algorithm, AlgorithmParseError, Bounds, LimitConfig, LimitConfigPayload};
pub use loadtest::{
    BurstParams, ConstantParams, DdosParams, PoissonParams, ProfileConfig, SinusoidalParams,
    TestConfig,
};
