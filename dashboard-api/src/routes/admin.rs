//! Batch operation endpoints for the admin panel

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use dashboard_core::{BatchOperation, BatchOperationRecord, BatchStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// Arguments for operations that take them (`trainMLModels`)
#[derive(Debug, Deserialize)]
struct OperationParams {
    days_back: Option<u32>,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct OperationsResponse {
    operations: Vec<BatchOperationRecord>,
    busy: bool,
}

/// Create admin routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/admin/operations",
            get(list_operations).delete(clear_operations),
        )
        .route(
            "/admin/operations/{operation}",
            post(run_operation).get(get_operation),
        )
        .route("/admin/update-all", post(update_all))
}

/// Run a named operation to completion. A failed operation answers 502 with
/// its record.
async fn run_operation(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<OperationParams>,
) -> Result<(StatusCode, Json<BatchOperationRecord>), ApiError> {
    let mut operation: BatchOperation = name.parse()?;
    if let BatchOperation::TrainMlModels { days_back, force } = &mut operation {
        *days_back = params.days_back;
        *force = params.force;
    }

    info!("Admin triggered {}", operation);
    let record = state.batch.execute(operation).await;
    let code = match record.status {
        BatchStatus::Failed => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    };
    Ok((code, Json(record)))
}

async fn list_operations(State(state): State<AppState>) -> Json<OperationsResponse> {
    Json(OperationsResponse {
        operations: state.batch.operations(),
        busy: state.batch.is_busy(),
    })
}

/// Look up one record by id
async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BatchOperationRecord>, ApiError> {
    state
        .batch
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No operation with id {}", id)))
}

async fn clear_operations(State(state): State<AppState>) -> StatusCode {
    state.batch.clear();
    StatusCode::NO_CONTENT
}

/// Trigger every data service's batch update concurrently
async fn update_all(State(state): State<AppState>) -> Json<Vec<BatchOperationRecord>> {
    Json(state.aggregator.update_all_services().await)
}
