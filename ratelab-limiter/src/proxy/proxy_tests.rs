use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use ratelab_core::store::StoreSettings;
use ratelab_types::{Algorithm, Bounds, LimitConfig};
use tower::util::ServiceExt;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::build_router;
use crate::settings::Settings;
use crate::state::AppState;

fn test_settings(target_url: &str, fail_open: bool) -> Settings {
    Settings {
        port: 0,
        target_url: target_url.to_string(),
        defaults: LimitConfig {
            algorithm: Algorithm::Fixed,
            limit: 100,
            window_seconds: 60,
            capacity: 100,
            fill_rate: 10.0,
        },
        bounds: Bounds::default(),
        fail_open,
        // nothing listens on port 1, so every decision takes the fail-open path
        store: StoreSettings { host: "127.0.0.1".into(), port: 1 },
        health_interval: Duration::from_secs(5),
        refresh_interval: Duration::from_secs(30),
        adaptive_enabled: false,
        adaptive_url: None,
        adaptive_interval: Duration::from_secs(30),
        adaptive_timeout: Duration::from_secs(5),
    }
}

fn test_state(target_url: &str, fail_open: bool) -> AppState {
    AppState::new(&test_settings(target_url, fail_open)).unwrap()
}

async fn read_body(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

#[tokio::test]
async fn allowed_requests_are_forwarded_with_path_query_and_body() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("pong")
                .insert_header("x-upstream", "1"),
        )
        .mount(&upstream)
        .await;

    let state = test_state(&upstream.uri(), true);
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/things?x=1&y=2")
                .header("x-custom", "abc")
                .header("connection", "keep-alive")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-upstream").map(|v| v.to_str().unwrap()),
        Some("1")
    );
    assert_eq!(read_body(response).await, "pong");

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let request = &received[0];
    assert_eq!(request.url.path(), "/api/things");
    assert_eq!(request.url.query(), Some("x=1&y=2"));
    assert_eq!(request.body, b"hello");
    assert_eq!(
        request.headers.get("x-custom").map(|v| v.to_str().unwrap()),
        Some("abc")
    );
    assert!(
        request.headers.get("connection").is_none(),
        "hop-by-hop headers must be stripped"
    );
}

#[tokio::test]
async fn denied_requests_never_reach_the_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;

    // fail-open disabled: with the store down, every decision denies
    let state = test_state(&upstream.uri(), false);
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/anything").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(read_body(response).await, "Rate limit exceeded");
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upstream_failure_surfaces_as_bad_gateway() {
    let state = test_state("http://127.0.0.1:1", true);
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_body(response).await, "Upstream error");
}

#[tokio::test]
async fn upstream_hop_by_hop_response_headers_are_stripped() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("keep-alive", "timeout=5")
                .insert_header("x-kept", "yes"),
        )
        .mount(&upstream)
        .await;

    let state = test_state(&upstream.uri(), true);
    let app = build_router(state);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("keep-alive").is_none());
    assert_eq!(
        response.headers().get("x-kept").map(|v| v.to_str().unwrap()),
        Some("yes")
    );
}

#[tokio::test]
async fn traffic_stats_see_every_decision() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;

    let state = test_state(&upstream.uri(), true);
    let app = build_router(state.clone());

    for _ in 0..4 {
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let snapshot = state.inner.traffic.snapshot_and_reset(Duration::from_secs(1));
    assert_eq!(snapshot.rejected_rate, 0.0);
    assert_eq!(snapshot.errors_5xx, 0);
}
