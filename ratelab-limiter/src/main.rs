//! Ratelab rate-limiting reverse proxy.
//!
//! Sits between the load generator and the target service. Every inbound
//! request is admitted or rejected by one of three interchangeable
//! algorithms (fixed window, sliding window, token bucket) whose state
//! lives in a shared store, with fail-open degradation when the store is
//! unreachable. A config API allows live reconfiguration, and an adaptive
//! loop periodically asks an external advisor for new limits.

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod api;
mod proxy;
mod settings;
mod state;

use ratelab_core::limiter::{
    start_adaptive_loop, start_health_checker, start_refresh_loop, AdaptiveContext,
};
use ratelab_core::metrics::{describe_limiter_metrics, init_metrics, render_metrics};
use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::from_env();
    init_metrics();
    describe_limiter_metrics();

    let state = AppState::new(&settings)?;
    info!(
        port = settings.port,
        target_url = %settings.target_url,
        algorithm = %settings.defaults.algorithm,
        "Rate limiter starting"
    );

    state.inner.config.load_from_store().await;

    start_health_checker(
        Arc::clone(&state.inner.store),
        Arc::clone(&state.inner.availability),
        settings.health_interval,
    );
    start_refresh_loop(Arc::clone(&state.inner.config), settings.refresh_interval);
    start_adaptive_loop(AdaptiveContext {
        settings: Arc::clone(&state.inner.adaptive),
        config: Arc::clone(&state.inner.config),
        traffic: Arc::clone(&state.inner.traffic),
        latency: Arc::clone(&state.inner.latency),
        availability: Arc::clone(&state.inner.availability),
        http: state.inner.http_client.clone(),
    });

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::router())
        .route("/health", get(health_check))
        .route("/actuator/prometheus", get(prometheus_metrics))
        .fallback(proxy::proxy_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, axum::Json(serde_json::json!({"status": "ok"})))
}

async fn prometheus_metrics() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], render_metrics())
}
