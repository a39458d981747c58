//! Adaptive loop behavior against a mock advisor.

use std::sync::Arc;
use std::time::Duration;

use ratelab_core::limiter::{
    start_adaptive_loop, AdaptiveContext, AdaptiveSettings, ConfigStore, LatencyWindow,
    StoreAvailability, TrafficStats,
};
use ratelab_core::store::{Store, StoreSettings};
use ratelab_types::{Algorithm, Bounds, LimitConfig};
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

fn defaults() -> LimitConfig {
    LimitConfig {
        algorithm: Algorithm::Fixed,
        limit: 100,
        window_seconds: 60,
        capacity: 100,
        fill_rate: 10.0,
    }
}

struct Fixture {
    settings: Arc<AdaptiveSettings>,
    config: Arc<ConfigStore>,
    traffic: Arc<TrafficStats>,
    availability: Arc<StoreAvailability>,
}

fn start_fixture(enabled: bool, url: String, interval: Duration) -> Fixture {
    let store_settings = StoreSettings { host: "127.0.0.1".into(), port: 1 };
    let store = Arc::new(Store::new(&store_settings).unwrap());
    let settings = Arc::new(AdaptiveSettings::new(
        enabled,
        Some(url),
        interval,
        Duration::from_secs(1),
    ));
    let config = Arc::new(ConfigStore::new(defaults(), Bounds::default(), store));
    let traffic = Arc::new(TrafficStats::new());
    let availability = Arc::new(StoreAvailability::new());
    start_adaptive_loop(AdaptiveContext {
        settings: Arc::clone(&settings),
        config: Arc::clone(&config),
        traffic: Arc::clone(&traffic),
        latency: Arc::new(LatencyWindow::default()),
        availability: Arc::clone(&availability),
        http: reqwest::Client::new(),
    });
    Fixture { settings, config, traffic, availability }
}

async fn advisor_returning(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn advisor_recommendation_is_applied() {
    let server =
        advisor_returning(json!({"algorithm": "fixed", "limit": 55, "window": 30})).await;
    let fixture = start_fixture(true, server.uri(), Duration::from_millis(200));
    fixture.traffic.record_decision(true, 200);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let current = fixture.config.current();
    assert_eq!(current.limit, 55);
    assert_eq!(current.window_seconds, 30);
    assert!(!server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn posted_payload_carries_telemetry_and_config() {
    let server =
        advisor_returning(json!({"algorithm": "fixed", "limit": 100, "window": 60})).await;
    let fixture = start_fixture(true, server.uri(), Duration::from_millis(300));
    for _ in 0..8 {
        fixture.traffic.record_decision(true, 200);
    }
    for _ in 0..2 {
        fixture.traffic.record_decision(false, 429);
    }

    tokio::time::sleep(Duration::from_millis(450)).await;

    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty());
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["algorithm"], "fixed");
    assert_eq!(body["limit"], 100);
    assert!((body["rejectedRate"].as_f64().unwrap() - 0.2).abs() < 1e-9);
    assert!(body["observedRps"].as_f64().unwrap() > 0.0);
    assert!(body["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn first_tick_after_enable_discards_stale_telemetry() {
    let server =
        advisor_returning(json!({"algorithm": "fixed", "limit": 70, "window": 60})).await;
    let fixture = start_fixture(false, server.uri(), Duration::from_millis(300));

    // telemetry accumulated while disabled is stale
    for _ in 0..50 {
        fixture.traffic.record_decision(false, 429);
    }

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(server.received_requests().await.unwrap().is_empty(), "disabled loop must not post");

    fixture.settings.set_enabled(true);
    // the first tick after the enable resets the snapshot without posting
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(
        server.received_requests().await.unwrap().is_empty(),
        "enable-transition tick must not post"
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    let requests = server.received_requests().await.unwrap();
    assert!(!requests.is_empty(), "second tick after enable posts");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body["rejectedRate"].as_f64().unwrap(),
        0.0,
        "stale pre-enable rejections must not leak into the first posted snapshot"
    );
}

#[tokio::test]
async fn advisor_failures_keep_current_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;
    let fixture = start_fixture(true, server.uri(), Duration::from_millis(200));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*fixture.config.current(), defaults(), "invalid response is ignored");
}

#[tokio::test]
async fn unreachable_advisor_keeps_current_config() {
    let fixture =
        start_fixture(true, "http://127.0.0.1:1/advice".into(), Duration::from_millis(200));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*fixture.config.current(), defaults());
}

#[tokio::test]
async fn store_outage_skips_the_tick() {
    let server =
        advisor_returning(json!({"algorithm": "fixed", "limit": 55, "window": 30})).await;
    let fixture = start_fixture(true, server.uri(), Duration::from_millis(200));
    fixture.availability.mark_unavailable("probe failed");

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(*fixture.config.current(), defaults());
}
