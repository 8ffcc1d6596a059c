use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::time::Instant;
use tracing::error;

use crate::{handlers::AppState, metrics};

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn get_uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Liveness probe: the process is up and serving requests
async fn liveness_check() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": get_uptime_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Readiness probe: the data store answers
async fn readiness_check(State(state): State<AppState>) -> Response {
    let started = Instant::now();
    let result = state.store.ping().await;
    let latency_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "environment": state.config.environment,
                "checks": {
                    "store": { "status": "up", "latency_ms": latency_ms }
                }
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "not_ready",
                    "environment": state.config.environment,
                    "checks": {
                        "store": { "status": "down", "error": e.response_message() }
                    }
                })),
            )
                .into_response()
        }
    }
}

/// Prometheus text exposition of the workflow counters
async fn metrics_endpoint() -> Response {
    match metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness_check))
        .route("/health/ready", get(readiness_check))
}

pub fn metrics_routes() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_endpoint))
}
