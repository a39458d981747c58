//! Profile construction and validation from wire configuration.

use parking_lot::Mutex;
use ratelab_types::{
    BurstParams, ConstantParams, DdosParams, PoissonParams, ProfileConfig, SinusoidalParams,
};
use serde::de::DeserializeOwned;

use crate::error::{CoreError, CoreResult};

use super::LoadProfile;

/// Build a validated profile from the tagged wire form.
pub fn build_profile(config: &ProfileConfig) -> CoreResult<LoadProfile> {
    let kind = config.kind.trim().to_ascii_lowercase();
    match kind.as_str() {
        "constant" => {
            let params: ConstantParams = decode_params(config)?;
            require_positive(params.rps, "rps")?;
            Ok(LoadProfile::Constant { rps: params.rps })
        }
        "burst" => {
            let params: BurstParams = decode_params(config)?;
            require_non_negative(params.base_rps, "baseRps")?;
            require_positive(params.spike_rps, "spikeRps")?;
            require_duration_positive(params.spike_duration.0, "spikeDuration")?;
            require_duration_positive(params.spike_period.0, "spikePeriod")?;
            if params.spike_duration.0 > params.spike_period.0 {
                return Err(CoreError::invalid("spikeDuration must be <= spikePeriod"));
            }
            Ok(LoadProfile::Burst {
                base_rps: params.base_rps,
                spike_rps: params.spike_rps,
                spike_duration: params.spike_duration.0,
                spike_period: params.spike_period.0,
            })
        }
        "sinusoidal" => {
            let params: SinusoidalParams = decode_params(config)?;
            require_non_negative(params.min_rps, "minRps")?;
            require_positive(params.max_rps, "maxRps")?;
            if params.max_rps < params.min_rps {
                return Err(CoreError::invalid("maxRps must be >= minRps"));
            }
            require_duration_positive(params.period.0, "period")?;
            Ok(LoadProfile::Sinusoidal {
                min_rps: params.min_rps,
                max_rps: params.max_rps,
                period: params.period.0,
            })
        }
        "poisson" => {
            let params: PoissonParams = decode_params(config)?;
            require_positive(params.average_rps, "averageRps")?;
            Ok(LoadProfile::Poisson { average_rps: params.average_rps })
        }
        "ddos" => {
            let params: DdosParams = decode_params(config)?;
            require_non_negative(params.min_rps, "minRps")?;
            require_positive(params.max_rps, "maxRps")?;
            if params.max_rps < params.min_rps {
                return Err(CoreError::invalid("maxRps must be >= minRps"));
            }
            require_duration_positive(params.max_spike_duration.0, "maxSpikeDuration")?;
            if params.max_idle_time.0 < params.min_idle_time.0 {
                return Err(CoreError::invalid("maxIdleTime must be >= minIdleTime"));
            }
            Ok(LoadProfile::Ddos {
                min_rps: params.min_rps,
                max_rps: params.max_rps,
                max_spike_duration: params.max_spike_duration.0,
                min_idle_time: params.min_idle_time.0,
                max_idle_time: params.max_idle_time.0,
                state: Mutex::default(),
            })
        }
        "" => Err(CoreError::invalid("Profile type is required")),
        other => Err(CoreError::invalid(format!("Unsupported profile type: {other}"))),
    }
}

fn decode_params<T: DeserializeOwned>(config: &ProfileConfig) -> CoreResult<T> {
    if config.params.is_null() {
        return Err(CoreError::invalid("Profile params are required"));
    }
    serde_json::from_value(config.params.clone())
        .map_err(|e| CoreError::invalid(format!("Invalid {} params: {e}", config.kind)))
}

fn require_positive(value: f64, name: &str) -> CoreResult<()> {
    if value <= 0.0 {
        return Err(CoreError::invalid(format!("{name} must be > 0")));
    }
    Ok(())
}

fn require_non_negative(value: f64, name: &str) -> CoreResult<()> {
    if value < 0.0 {
        return Err(CoreError::invalid(format!("{name} must be >= 0")));
    }
    Ok(())
}

fn require_duration_positive(value: std::time::Duration, name: &str) -> CoreResult<()> {
    if value.is_zero() {
        return Err(CoreError::invalid(format!("{name} must be > 0")));
    }
    Ok(())
}
