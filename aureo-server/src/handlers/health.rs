//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, http::StatusCode, Json};
use aureo_core::MetricsSnapshot;
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    pub status: &'static str,
    /// Server version from Cargo.toml
    pub version: &'static str,
    /// Service name
    pub service: &'static str,
    /// Worker threads in the seal pool
    pub workers: usize,
    /// Jobs waiting for a worker
    pub queued: usize,
    /// Embed and detect counters since startup
    pub metrics: MetricsSnapshot,
}

/// GET /health - Health check endpoint
///
/// Returns JSON with service status, version, pool occupancy and seal metrics.
/// The service reports "degraded" while the pool has no workers.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let workers = state.pool.worker_count();
    let status = if workers > 0 { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        service: "aureo-server",
        workers,
        queued: state.pool.queued(),
        metrics: state.metrics.snapshot(),
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
    /// Optional message explaining status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// GET /ready - Kubernetes readiness probe
///
/// Ready while the pool has workers and room in its queue; a saturated
/// queue answers 503 so the balancer can route elsewhere.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let pool = &state.pool;
    if pool.worker_count() == 0 {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some("no seal workers running"),
            }),
        );
    }
    if pool.queued() >= pool.capacity() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some("seal queue is full"),
            }),
        );
    }
    (
        StatusCode::OK,
        Json(ReadyResponse {
            ready: true,
            message: None,
        }),
    )
}
