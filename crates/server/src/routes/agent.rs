use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use hub_core::WorkerResponse;
use serde_json::Value;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/agent/{worker_name}",
    params(
        ("worker_name" = String, Path, description = "Registered worker name"),
    ),
    responses(
        (status = 200, description = "Worker reply", body = WorkerResponse),
        (status = 404, description = "Unknown worker", body = ErrorResponse),
        (status = 409, description = "taskId already in flight", body = ErrorResponse),
        (status = 502, description = "Worker failed", body = ErrorResponse),
        (status = 504, description = "Worker timed out", body = ErrorResponse),
    ),
    tag = "orchestration"
)]
pub async fn run_agent(
    State(state): State<AppState>,
    Path(worker_name): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<WorkerResponse>, AppError> {
    let Json(task) = payload?;
    let response = state.orchestrator.run_direct(&worker_name, task).await?;
    Ok(Json(response))
}
