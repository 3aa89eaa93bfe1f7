use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use hub_core::WorkerResponse;
use orchestrator::AutoRouted;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrchestrateRequest {
    pub prompt: Option<String>,
    /// Used when `prompt` is absent.
    pub message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrateResponse {
    pub intent: String,
    #[schema(value_type = Object)]
    pub nlu_result: Value,
    pub worker: String,
    pub result: WorkerResponse,
}

impl From<AutoRouted> for OrchestrateResponse {
    fn from(routed: AutoRouted) -> Self {
        Self {
            intent: routed.intent,
            nlu_result: routed.nlu_result,
            worker: routed.worker,
            result: routed.result,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/orchestrate",
    request_body = OrchestrateRequest,
    responses(
        (status = 200, description = "Classified and routed", body = OrchestrateResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 502, description = "Classification or routed worker failed", body = ErrorResponse),
    ),
    tag = "orchestration"
)]
pub async fn orchestrate(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<OrchestrateResponse>, AppError> {
    let Json(task) = payload?;
    if !task.is_object() {
        return Err(AppError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ));
    }

    let routed = state.orchestrator.run_auto_routed(task).await?;
    Ok(Json(routed.into()))
}
