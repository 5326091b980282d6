use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the relational store answers.
    pub remote_healthy: bool,
    /// Whether the local cache can be read.
    pub local_healthy: bool,
}

/// GET /health -- returns service and source health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (remote, local) = tokio::join!(
        tokio::time::timeout(state.config.remote_timeout(), state.remote.ping()),
        state.local.entities(),
    );
    let remote_healthy = matches!(remote, Ok(Ok(())));
    let local_healthy = local.is_ok();

    let status = match (remote_healthy, local_healthy) {
        (true, true) => "ok",
        (false, false) => "down",
        _ => "degraded",
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        remote_healthy,
        local_healthy,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
