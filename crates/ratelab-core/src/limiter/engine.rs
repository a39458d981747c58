//! The limit decision engine.
//!
//! Each admission decision runs a single server-side script against the
//! shared store, so the check-and-mutate sequence is race-free across
//! limiter replicas. When the store is unreachable the engine answers with
//! the configured fail-open policy without touching the network.

use std::sync::Arc;

use metrics::{counter, histogram};
use redis::aio::ConnectionManager;
use redis::Script;
use ratelab_types::{Algorithm, LimitConfig};
use tokio::time::Instant;

use crate::clock::{epoch_millis, epoch_seconds};
use crate::error::CoreResult;
use crate::store::Store;

use super::availability::StoreAvailability;
use super::{FIXED_KEY_PREFIX, SLIDING_KEY_PREFIX, TOKEN_KEY};

const FIXED_WINDOW_SCRIPT: &str = r"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
";

const SLIDING_WINDOW_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local previous = tonumber(redis.call('GET', KEYS[2]) or "0")
local elapsed = tonumber(ARGV[2])
local windowMs = tonumber(ARGV[3])
local weight = (windowMs - elapsed) / windowMs
if weight < 0 then
  weight = 0
end
return previous * weight + current
"#;

const TOKEN_BUCKET_SCRIPT: &str = r"
local capacity = tonumber(ARGV[1])
local fillRate = tonumber(ARGV[2])
local nowMs = tonumber(ARGV[3])
local ttlMs = tonumber(ARGV[4])

local data = redis.call('HMGET', KEYS[1], 'tokens', 'lastRefill')
local tokens = tonumber(data[1])
local lastRefill = tonumber(data[2])
if tokens == nil then
  tokens = capacity
  lastRefill = nowMs
end

local delta = nowMs - lastRefill
if delta < 0 then
  delta = 0
end
local refill = (delta / 1000.0) * fillRate
tokens = math.min(capacity, tokens + refill)

local allowed = 0
if tokens >= 1 then
  tokens = tokens - 1
  allowed = 1
end

redis.call('HMSET', KEYS[1], 'tokens', tokens, 'lastRefill', nowMs)
redis.call('PEXPIRE', KEYS[1], ttlMs)
return allowed
";

pub struct StoreRateLimiter {
    store: Arc<Store>,
    availability: Arc<StoreAvailability>,
    fail_open: bool,
    fixed_script: Script,
    sliding_script: Script,
    token_script: Script,
}

impl StoreRateLimiter {
    pub fn new(store: Arc<Store>, availability: Arc<StoreAvailability>, fail_open: bool) -> Self {
        Self {
            store,
            availability,
            fail_open,
            fixed_script: Script::new(FIXED_WINDOW_SCRIPT),
            sliding_script: Script::new(SLIDING_WINDOW_SCRIPT),
            token_script: Script::new(TOKEN_BUCKET_SCRIPT),
        }
    }

    /// Admit or deny one request under `config`.
    pub async fn allow(&self, config: &LimitConfig) -> bool {
        if !self.availability.is_available() {
            return self.fail_open;
        }

        let started = Instant::now();
        let result = self.run_decision(config).await;
        histogram!("ratelimiter_store_request_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(allowed) => {
                self.availability.mark_available();
                allowed
            }
            Err(e) => {
                counter!("ratelimiter_store_errors_total").increment(1);
                self.availability.mark_unavailable(&e.to_string());
                tracing::warn!(error = %e, "Store request failed, applying fail-open policy");
                self.fail_open
            }
        }
    }

    async fn run_decision(&self, config: &LimitConfig) -> CoreResult<bool> {
        let mut conn = self.store.connection().await?;
        match config.algorithm {
            Algorithm::Fixed => self.allow_fixed(&mut conn, config).await,
            Algorithm::Sliding => self.allow_sliding(&mut conn, config).await,
            Algorithm::Token => self.allow_token(&mut conn, config).await,
        }
    }

    async fn allow_fixed(
        &self,
        conn: &mut ConnectionManager,
        config: &LimitConfig,
    ) -> CoreResult<bool> {
        let window_seconds = config.window_seconds.max(1);
        let window_id = epoch_seconds() / window_seconds;
        let key = format!("{FIXED_KEY_PREFIX}{window_id}");
        let count: i64 = self
            .fixed_script
            .key(key)
            .arg(window_seconds)
            .invoke_async(conn)
            .await?;
        Ok(count >= 0 && (count as u64) <= config.limit)
    }

    async fn allow_sliding(
        &self,
        conn: &mut ConnectionManager,
        config: &LimitConfig,
    ) -> CoreResult<bool> {
        let window_ms = config.window_seconds.max(1) * 1000;
        let now_ms = epoch_millis() as u64;
        let current_start = now_ms - (now_ms % window_ms);
        let previous_start = current_start.saturating_sub(window_ms);
        let elapsed_in_window = now_ms - current_start;
        let ttl_ms = window_ms * 2;

        let current_key = format!("{SLIDING_KEY_PREFIX}{current_start}");
        let previous_key = format!("{SLIDING_KEY_PREFIX}{previous_start}");

        // the script's numeric reply comes back truncated to an integer
        let estimate: i64 = self
            .sliding_script
            .key(current_key)
            .key(previous_key)
            .arg(ttl_ms)
            .arg(elapsed_in_window)
            .arg(window_ms)
            .invoke_async(conn)
            .await?;
        Ok(estimate >= 0 && (estimate as u64) <= config.limit)
    }

    async fn allow_token(
        &self,
        conn: &mut ConnectionManager,
        config: &LimitConfig,
    ) -> CoreResult<bool> {
        let ttl_ms = token_ttl_ms(config.capacity, config.fill_rate);
        let allowed: i64 = self
            .token_script
            .key(TOKEN_KEY)
            .arg(config.capacity)
            .arg(config.fill_rate)
            .arg(epoch_millis())
            .arg(ttl_ms)
            .invoke_async(conn)
            .await?;
        Ok(allowed == 1)
    }
}

/// Twice the full-refill time, floored at one second, so an idle bucket
/// expires instead of pinning memory.
fn token_ttl_ms(capacity: u64, fill_rate: f64) -> u64 {
    if fill_rate <= 0.0 {
        return 1000;
    }
    let refill_seconds = capacity as f64 / fill_rate;
    ((refill_seconds * 2000.0).ceil() as u64).max(1000)
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[test]
    fn token_ttl_is_twice_refill_time_with_floor() {
        assert_eq!(token_ttl_ms(100, 10.0), 20_000);
        assert_eq!(token_ttl_ms(1, 10.0), 1000);
        assert_eq!(token_ttl_ms(3, 2.0), 3000);
        assert_eq!(token_ttl_ms(100, 0.0), 1000);
    }
}
