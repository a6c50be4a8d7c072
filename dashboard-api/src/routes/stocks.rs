//! Per-ticker data endpoints

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use dashboard_client::{normalize_ticker, DEFAULT_HISTORY_DAYS};
use dashboard_core::{CompleteAnalysis, Subsystem};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::state::{run_query, AppState};

#[derive(Debug, Deserialize)]
struct RefreshQuery {
    /// Bypass the cache
    #[serde(default)]
    refresh: bool,
}

#[derive(Debug, Deserialize)]
struct PriceHistoryQuery {
    days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PredictionHistoryQuery {
    days_back: Option<u32>,
    include_accuracy: Option<bool>,
}

/// Create stock routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stocks/{ticker}/analysis", get(complete_analysis))
        .route("/stocks/{ticker}/comprehensive", get(comprehensive_data))
        .route("/stocks/{ticker}/price-history", get(price_history))
        .route("/stocks/{ticker}/prediction-history", get(prediction_history))
        .route("/stocks/{ticker}/{kind}", get(subsystem_data))
}

/// All six subsystems for one ticker; failed subsystems are reported in `errors`
async fn complete_analysis(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(params): Query<RefreshQuery>,
) -> Result<Json<CompleteAnalysis>, ApiError> {
    let ticker = normalize_ticker(&ticker)?;
    debug!("Complete analysis requested for {}", ticker);

    let query = state.queries.analysis(&ticker);
    Ok(Json(run_query(&query, ticker, params.refresh).await?))
}

/// One subsystem: price, technical, fundamental, news, social or ml
async fn subsystem_data(
    State(state): State<AppState>,
    Path((ticker, kind)): Path<(String, String)>,
    Query(params): Query<RefreshQuery>,
) -> Result<Json<Value>, ApiError> {
    let ticker = normalize_ticker(&ticker)?;
    let subsystem: Subsystem = kind.parse()?;

    let query = state.queries.subsystem(subsystem, &ticker);
    Ok(Json(run_query(&query, ticker, params.refresh).await?))
}

/// Orchestrator's combined view, uncached
async fn comprehensive_data(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let response = state.client.get_comprehensive_data(&ticker).await?;
    Ok(Json(response.into_result()?))
}

async fn price_history(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(params): Query<PriceHistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    let response = state.client.get_price_history(&ticker, days).await?;
    Ok(Json(response.into_result()?))
}

async fn prediction_history(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(params): Query<PredictionHistoryQuery>,
) -> Result<Json<Value>, ApiError> {
    let args = (
        normalize_ticker(&ticker)?,
        params.days_back.unwrap_or(DEFAULT_HISTORY_DAYS),
        params.include_accuracy.unwrap_or(true),
    );
    let query = state.queries.prediction_history(&args)?;
    Ok(Json(run_query(&query, args, false).await?))
}
