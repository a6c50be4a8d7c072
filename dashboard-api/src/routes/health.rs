//! Health check endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use dashboard_core::{HealthRecord, Service, SystemHealth};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct HealthQuery {
    /// Probe every service now instead of serving the last snapshot
    #[serde(default)]
    refresh: bool,
}

/// System health handler
async fn system_health(
    State(state): State<AppState>,
    Query(params): Query<HealthQuery>,
) -> (StatusCode, Json<SystemHealth>) {
    let health = if params.refresh {
        state.health.check_all().await
    } else {
        state.health.latest()
    };

    let code = if health.overall.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(health))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Probe one named service
async fn service_health(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<HealthRecord>, ApiError> {
    let service: Service = service.parse()?;
    Ok(Json(state.health.check_one(service).await))
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(system_health))
        .route("/health/live", get(liveness))
        .route("/health/{service}", get(service_health))
}
