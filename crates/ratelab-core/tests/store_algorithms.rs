//! Algorithm boundary behavior against a real shared store.
//!
//! These tests need a running Redis (REDIS_HOST/REDIS_PORT, default
//! localhost:6379) and share its key space, so run them serially:
//!
//! ```sh
//! cargo test --test store_algorithms -- --ignored --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use ratelab_core::limiter::{ConfigStore, StoreAvailability, StoreRateLimiter};
use ratelab_core::store::{Store, StoreSettings};
use ratelab_types::{Algorithm, Bounds, LimitConfig};

fn store_settings() -> StoreSettings {
    StoreSettings {
        host: std::env::var("REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("REDIS_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(6379),
    }
}

struct Fixture {
    store: Arc<Store>,
    limiter: StoreRateLimiter,
    availability: Arc<StoreAvailability>,
}

async fn fixture() -> Fixture {
    let store = Arc::new(Store::new(&store_settings()).unwrap());
    store.ping().await.expect("these tests need a running Redis");
    let availability = Arc::new(StoreAvailability::new());
    let limiter =
        StoreRateLimiter::new(Arc::clone(&store), Arc::clone(&availability), true);
    // start from a clean key space
    ratelab_core::limiter::reset::reset_algorithm_state(&store).await;
    Fixture { store, limiter, availability }
}

fn config(algorithm: Algorithm, limit: u64, window_seconds: u64, capacity: u64, fill_rate: f64) -> LimitConfig {
    LimitConfig { algorithm, limit, window_seconds, capacity, fill_rate }
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn fixed_window_allows_exactly_the_limit() {
    let fixture = fixture().await;
    let config = config(Algorithm::Fixed, 5, 60, 100, 10.0);

    for i in 0..5 {
        assert!(fixture.limiter.allow(&config).await, "request {i} within the limit");
    }
    assert!(!fixture.limiter.allow(&config).await, "limit+1 must be denied");
    assert!(fixture.availability.is_available());
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn token_bucket_drains_then_refills() {
    let fixture = fixture().await;
    let config = config(Algorithm::Token, 100, 60, 5, 2.0);

    for i in 0..5 {
        assert!(fixture.limiter.allow(&config).await, "draw {i} from a full bucket");
    }
    assert!(!fixture.limiter.allow(&config).await, "empty bucket must deny");

    // 2 tokens/s: one token is back after ~500ms
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(fixture.limiter.allow(&config).await, "refilled token must be granted");
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn sliding_window_denies_once_the_estimate_passes_the_limit() {
    let fixture = fixture().await;
    let config = config(Algorithm::Sliding, 3, 2, 100, 10.0);

    let mut allowed = 0;
    for _ in 0..4 {
        if fixture.limiter.allow(&config).await {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 3, "only the limit passes within one window");
}

#[tokio::test]
#[ignore = "requires a running Redis"]
async fn algorithm_switch_starts_from_empty_state() {
    let fixture = fixture().await;
    let token = config(Algorithm::Token, 100, 60, 3, 0.1);

    for _ in 0..3 {
        assert!(fixture.limiter.allow(&token).await);
    }
    assert!(!fixture.limiter.allow(&token).await, "bucket drained");

    // switching away and back clears the drained bucket
    let configs = ConfigStore::new(token, Bounds::default(), Arc::clone(&fixture.store));
    configs.apply_algorithm(Algorithm::Fixed).await.unwrap();
    configs.apply_algorithm(Algorithm::Token).await.unwrap();

    assert!(
        fixture.limiter.allow(&token).await,
        "first decision after the switch sees a full bucket"
    );
}
