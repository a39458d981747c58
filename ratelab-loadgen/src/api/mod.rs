//! Operator API: start, stop, and inspect load tests.


use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::Value;

use ratelab_core::error::CoreError;
use ratelab_types::TestConfig;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/test/start", post(start_test))
        .route("/test/stop", post(stop_test))
        .route("/test/status", get(test_status))
}

/// `CoreError` mapped onto the operator API's status codes.
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
            CoreError::TestAlreadyRunning => StatusCode::CONFLICT,
            CoreError::TestNotRunning => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = status.as_u16(), error = %self.0, "Request rejected");
        (status, Json(serde_json::json!({"error": self.0.to_string()}))).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestStartResponse {
    status: &'static str,
    test_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestStopResponse {
    status: &'static str,
    test_id: String,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct TestStatusResponse {
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    concurrency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requests_sent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<u64>,
}

async fn start_test(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<TestStartResponse>, ApiError> {
    let config: TestConfig = serde_json::from_value(body)
        .map_err(|e| ApiError(CoreError::invalid(format!("Invalid test config: {e}"))))?;
    let execution = state.inner.manager.start(config)?;
    Ok(Json(TestStartResponse { status: "started", test_id: execution.test_id().to_string() }))
}

async fn stop_test(State(state): State<AppState>) -> Result<Json<TestStopResponse>, ApiError> {
    let execution = state.inner.manager.stop()?;
    Ok(Json(TestStopResponse { status: "stopped", test_id: execution.test_id().to_string() }))
}

async fn test_status(State(state): State<AppState>) -> Json<TestStatusResponse> {
    let Some(execution) = state.inner.manager.current().filter(|e| e.is_running()) else {
        return Json(TestStatusResponse::default());
    };
    let config = execution.config();
    Json(TestStatusResponse {
        running: true,
        test_id: Some(execution.test_id().to_string()),
        profile: Some(execution.profile_name().to_string()),
        target_url: Some(config.target_url.clone()),
        params: Some(config.profile.params.clone()),
        concurrency: config.concurrency,
        elapsed_seconds: Some(execution.elapsed().as_secs()),
        duration_seconds: Some(config.duration.0.as_secs()),
        requests_sent: Some(execution.requests_sent()),
        errors: Some(execution.errors()),
    })
}
