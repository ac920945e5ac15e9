//! System endpoints: health check and live hub statistics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Live hub statistics.
#[derive(Debug, Serialize, ToSchema)]
struct StatsResponse {
    /// Sockets currently accepted and registered.
    active_connections: usize,
    /// Pub/sub channels with at least one live subscription.
    active_channels: usize,
}

/// `GET /stats` — Live connection and channel counts.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Hub statistics",
    description = "Returns the number of live socket connections and subscribed channels.",
    responses(
        (status = 200, description = "Current statistics", body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = StatsResponse {
        active_connections: state.registry.len().await,
        active_channels: state.bus.transport().channel_count().await,
    };
    (StatusCode::OK, Json(response))
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}
