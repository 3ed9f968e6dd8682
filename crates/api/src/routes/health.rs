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
    /// Active detector variant (`precise` or `coarse`).
    pub detector: &'static str,
    /// Session store backend (`postgres` or `memory`).
    pub store: &'static str,
    /// Whether the session store is reachable.
    pub db_healthy: bool,
    /// Number of sessions currently accepting frames.
    pub active_sessions: usize,
    /// Number of open frame streams.
    pub ws_connections: usize,
}

/// GET /health -- returns service and session store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.sessions.store();
    let db_healthy = store.health_check().await.is_ok();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        detector: state.sessions.analyzer().detector_kind().as_str(),
        store: store.backend(),
        db_healthy,
        active_sessions: state.sessions.active_count().await,
        ws_connections: state.ws_manager.connection_count().await,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
