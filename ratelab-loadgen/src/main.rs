//! Ratelab load generator.
//!
//! Produces synthetic HTTP traffic following parametric profiles (constant,
//! burst, sinusoidal, poisson, ddos) against a configured target, with an
//! operator REST API on /test/* and Prometheus exposition on
//! /actuator/prometheus.

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod api;
mod settings;
mod state;

use ratelab_core::metrics::{describe_loadgen_metrics, init_metrics, render_metrics};
use ratelab_types::TestConfig;
use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::from_env();
    init_metrics();
    describe_loadgen_metrics();

    let state = AppState::new(settings.loadgen.clone());
    info!(port = settings.port, "Load generator starting");

    if let Some(path) = settings.config_file.clone() {
        auto_start_from_file(&state, &path).await;
    }

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::router())
        .route("/health", get(health_check))
        .route("/actuator/prometheus", get(prometheus_metrics))
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

/// `LOADGEN_CONFIG_FILE` names a JSON test config to start at boot.
async fn auto_start_from_file(state: &AppState, path: &str) {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path, error = %e, "Failed to read auto-start config file");
            return;
        }
    };
    let config: TestConfig = match serde_json::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path, error = %e, "Invalid auto-start config file");
            return;
        }
    };
    match state.inner.manager.start(config) {
        Ok(execution) => {
            info!(path, test_id = %execution.test_id(), "Auto-started load test from config file");
        }
        Err(e) => {
            tracing::warn!(path, error = %e, "Failed to auto-start load test");
        }
    }
}
