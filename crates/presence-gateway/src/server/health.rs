//! Health check endpoint

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::server::GatewayState;

/// Reachability of the backing stores
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub redis: bool,
    /// Absent when the graph is kept in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<bool>,
    pub connections: usize,
}

/// `GET /health`: 200 when every store answers, 503 otherwise
pub async fn health_check(State(state): State<GatewayState>) -> (StatusCode, Json<HealthReport>) {
    let redis = state.services().presence_store().ping().await.is_ok();
    let postgres = match state.pool() {
        Some(pool) => Some(presence_db::ping(pool).await.is_ok()),
        None => None,
    };

    let healthy = redis && postgres != Some(false);
    let status = if healthy {
        StatusCode::OK
    } else {
        tracing::warn!(redis, postgres = ?postgres, "Health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthReport {
            status: if healthy { "ok" } else { "degraded" },
            redis,
            postgres,
            connections: state.rooms().connection_count(),
        }),
    )
}
