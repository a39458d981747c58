//! Load profiles: parametric functions from elapsed time to a desired RPS.
//!
//! Profiles are a sum type dispatched on the tag. Each variant answers two
//! questions: what rate is intended right now (`current_rps`) and how long
//! the one-by-one scheduler should wait before the next send (`next_delay`).
//! The ddos variant carries a small phase state that lives for one test.

mod build;


pub use build::build_profile;

use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

/// Fallback wait when the intended rate is not positive.
const IDLE_TICK: Duration = Duration::from_secs(1);

/// Phase state for the ddos profile; created empty and driven by
/// `current_rps` calls over one test's lifetime.
#[derive(Debug, Default)]
pub struct DdosState {
    in_spike: bool,
    /// End of the current phase in elapsed-milliseconds; `None` until the
    /// first `current_rps` call draws the opening idle segment.
    segment_end_ms: Option<u64>,
}

#[derive(Debug)]
pub enum LoadProfile {
    Constant {
        rps: f64,
    },
    Burst {
        base_rps: f64,
        spike_rps: f64,
        spike_duration: Duration,
        spike_period: Duration,
    },
    Sinusoidal {
        min_rps: f64,
        max_rps: f64,
        period: Duration,
    },
    Poisson {
        average_rps: f64,
    },
    Ddos {
        min_rps: f64,
        max_rps: f64,
        max_spike_duration: Duration,
        min_idle_time: Duration,
        max_idle_time: Duration,
        state: Mutex<DdosState>,
    },
}

impl LoadProfile {
    pub fn name(&self) -> &'static str {
        match self {
            LoadProfile::Constant { .. } => "constant",
            LoadProfile::Burst { .. } => "burst",
            LoadProfile::Sinusoidal { .. } => "sinusoidal",
            LoadProfile::Poisson { .. } => "poisson",
            LoadProfile::Ddos { .. } => "ddos",
        }
    }

    /// Instantaneous intended rate at `elapsed` since test start.
    pub fn current_rps(&self, elapsed: Duration) -> f64 {
        match self {
            LoadProfile::Constant { rps } => *rps,
            LoadProfile::Burst { base_rps, spike_rps, spike_duration, spike_period } => {
                let period_ms = spike_period.as_millis() as u64;
                if period_ms == 0 {
                    return *base_rps;
                }
                let within = (elapsed.as_millis() as u64) % period_ms;
                if within < spike_duration.as_millis() as u64 {
                    *spike_rps
                } else {
                    *base_rps
                }
            }
            LoadProfile::Sinusoidal { min_rps, max_rps, period } => {
                let period_ms = period.as_millis() as f64;
                if period_ms <= 0.0 {
                    return *min_rps;
                }
                let mid = (min_rps + max_rps) / 2.0;
                let amplitude = (max_rps - min_rps) / 2.0;
                let radians = 2.0 * std::f64::consts::PI * (elapsed.as_millis() as f64 / period_ms);
                mid + amplitude * radians.sin()
            }
            LoadProfile::Poisson { average_rps } => *average_rps,
            LoadProfile::Ddos {
                min_rps,
                max_rps,
                max_spike_duration,
                min_idle_time,
                max_idle_time,
                state,
            } => {
                let now_ms = elapsed.as_millis() as u64;
                let mut state = state.lock();
                if state.segment_end_ms.is_none() {
                    state.in_spike = false;
                    state.segment_end_ms =
                        Some(now_ms + random_idle_ms(*min_idle_time, *max_idle_time));
                }
                if now_ms >= state.segment_end_ms.unwrap_or(0) {
                    if state.in_spike {
                        state.in_spike = false;
                        state.segment_end_ms =
                            Some(now_ms + random_idle_ms(*min_idle_time, *max_idle_time));
                    } else {
                        state.in_spike = true;
                        state.segment_end_ms = Some(now_ms + random_spike_ms(*max_spike_duration));
                    }
                }
                if state.in_spike {
                    *max_rps
                } else {
                    *min_rps
                }
            }
        }
    }

    /// Wait before the next send when emissions are driven one-by-one.
    ///
    /// Rate-periodic profiles derive this from `current_rps`; poisson draws
    /// an exponential inter-arrival instead.
    pub fn next_delay(&self, elapsed: Duration) -> Duration {
        match self {
            LoadProfile::Poisson { average_rps } => {
                if *average_rps <= 0.0 {
                    return IDLE_TICK;
                }
                let u: f64 = rand::thread_rng().gen();
                let delay_seconds = -(1.0 - u).ln() / average_rps;
                Duration::from_secs_f64(delay_seconds.max(0.0))
            }
            _ => default_delay(self.current_rps(elapsed)),
        }
    }
}

fn default_delay(rps: f64) -> Duration {
    if rps <= 0.0 {
        return IDLE_TICK;
    }
    Duration::from_secs_f64(1.0 / rps)
}

fn random_spike_ms(max_spike_duration: Duration) -> u64 {
    let max_ms = (max_spike_duration.as_millis() as u64).max(1);
    rand::thread_rng().gen_range(1..=max_ms)
}

fn random_idle_ms(min_idle_time: Duration, max_idle_time: Duration) -> u64 {
    let min_ms = min_idle_time.as_millis() as u64;
    let max_ms = (max_idle_time.as_millis() as u64).max(min_ms);
    if min_ms == max_ms {
        return min_ms;
    }
    rand::thread_rng().gen_range(min_ms..=max_ms)
}
