//! ML prediction endpoints

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use dashboard_client::{validate_min_confidence, DEFAULT_PREDICTION_LIMIT};
use dashboard_core::Signal;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::state::{run_query, AppState};

#[derive(Debug, Deserialize)]
struct LatestPredictionsQuery {
    limit: Option<u32>,
    /// BUY, SELL or HOLD
    signal: Option<String>,
    min_confidence: Option<f64>,
}

/// Create prediction routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/predictions/latest", get(latest_predictions))
        .route("/predictions/performance", get(performance))
        .route("/predictions/dashboard", get(performance_dashboard))
        .route("/predictions/dependencies", get(dependencies))
}

async fn latest_predictions(
    State(state): State<AppState>,
    Query(params): Query<LatestPredictionsQuery>,
) -> Result<Json<Value>, ApiError> {
    let signal = params
        .signal
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<Signal>)
        .transpose()?;
    let min_confidence = params.min_confidence.unwrap_or(0.0);
    validate_min_confidence(min_confidence)?;
    let args = (
        params.limit.unwrap_or(DEFAULT_PREDICTION_LIMIT),
        signal,
        min_confidence,
    );

    let query = state.queries.latest_predictions(&args)?;
    Ok(Json(run_query(&query, args, false).await?))
}

/// Model evaluation over the default window
async fn performance(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let query = state.queries.ml_performance();
    Ok(Json(run_query(&query, (), false).await?))
}

async fn performance_dashboard(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.client.get_performance_dashboard().await.into_result()?))
}

async fn dependencies(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.client.check_ml_dependencies().await.into_result()?))
}
