//! HTTP surface of the service

use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::build_info;
use crate::error::HealthError;
use crate::health::Aggregator;

pub const SERVICE_NAME: &str = "Google Cloud Services Health Check API";

/// Fixed liveness path polled by the hosting platform
pub const LIVENESS_PATH: &str = "/status-0123456789abcdef";

/// Response header carrying the overall status of a `/health` run
pub const HEALTH_STATUS_HEADER: &str = "x-health-status";

/// Shared state of the router
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    /// Outer deadline applied to every `/health` run
    pub deadline: Option<Duration>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, deadline: Option<Duration>) -> Self {
        Self {
            aggregator,
            deadline,
        }
    }
}

/// Builds the router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route(LIVENESS_PATH, get(liveness))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": build_info::VERSION,
        "health_endpoint": "/health",
        "build": build_info::current(),
    }))
}

/// Runs every probe; unhealthy dependencies are still a 200
async fn health(State(state): State<AppState>) -> Result<Response, AppError> {
    let report = match state.deadline {
        Some(deadline) => state.aggregator.run_all_within(deadline).await?,
        None => state.aggregator.run_all().await?,
    };

    let status = report.overall_status().as_str();
    Ok(([(HEALTH_STATUS_HEADER, status)], Json(report.into_results())).into_response())
}

async fn liveness() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Engine failure mapped to a 500
#[derive(Debug)]
pub struct AppError(pub HealthError);

impl From<HealthError> for AppError {
    fn from(err: HealthError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Health aggregation failed");

        let payload = json!({
            "error": "health aggregation failed"
        });

        (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
    }
}
