//! Config API: inspect and update limits, switch algorithms, toggle the
//! adaptive loop.


use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ratelab_core::error::CoreError;
use ratelab_types::{Algorithm, LimitConfigPayload};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config/limits", get(get_limits).post(update_limits))
        .route("/config/algorithm", post(update_algorithm))
        .route("/config/adaptive", get(get_adaptive).post(update_adaptive))
}

/// `CoreError` mapped onto the config API's status codes.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(error: CoreError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::InvalidConfiguration(_) | CoreError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = status.as_u16(), error = %self.0, "Request rejected");
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

async fn get_limits(State(state): State<AppState>) -> Json<LimitConfigPayload> {
    Json(state.inner.config.current().to_payload())
}

async fn update_limits(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<LimitConfigPayload>, ApiError> {
    let payload: LimitConfigPayload = serde_json::from_value(body)
        .map_err(|e| ApiError(CoreError::invalid(format!("Invalid config payload: {e}"))))?;
    let applied = state.inner.config.apply(payload, "api", true).await?;
    Ok(Json(applied.to_payload()))
}

#[derive(Deserialize)]
struct AlgorithmQuery {
    algorithm: Option<String>,
}

/// Algorithm comes from the query string or the body, query winning.
async fn update_algorithm(
    State(state): State<AppState>,
    Query(query): Query<AlgorithmQuery>,
    body: Option<Json<Value>>,
) -> Result<Json<LimitConfigPayload>, ApiError> {
    let from_body = body
        .as_ref()
        .and_then(|Json(value)| value.get("algorithm"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let raw = query
        .algorithm
        .or(from_body)
        .ok_or_else(|| ApiError(CoreError::invalid("algorithm is required")))?;
    let algorithm: Algorithm = raw
        .parse()
        .map_err(|e| ApiError(CoreError::invalid(format!("{e}"))))?;
    let applied = state.inner.config.apply_algorithm(algorithm).await?;
    Ok(Json(applied.to_payload()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdaptiveStatusResponse {
    enabled: bool,
    url: String,
    interval_seconds: u64,
    timeout_seconds: u64,
}

async fn get_adaptive(State(state): State<AppState>) -> Json<AdaptiveStatusResponse> {
    let adaptive = &state.inner.adaptive;
    Json(AdaptiveStatusResponse {
        enabled: adaptive.is_enabled(),
        url: adaptive.url(),
        interval_seconds: adaptive.interval.as_secs(),
        timeout_seconds: adaptive.timeout.as_secs(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdaptiveUpdateRequest {
    enabled: bool,
    url: Option<String>,
}

async fn update_adaptive(
    State(state): State<AppState>,
    Json(request): Json<AdaptiveUpdateRequest>,
) -> Json<AdaptiveStatusResponse> {
    let adaptive = &state.inner.adaptive;
    adaptive.set_url(request.url);
    adaptive.set_enabled(request.enabled);
    tracing::info!(enabled = request.enabled, "Adaptive mode toggled via API");
    get_adaptive(State(state.clone())).await
}
