use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    service: String,
    status: String,
    version: String,
    environment: String,
    agents: usize,
    active_tasks: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: state.service.name.clone(),
        status: "healthy".to_string(),
        version: state.service.version.clone(),
        environment: state.service.environment.clone(),
        agents: state.orchestrator.agents().len(),
        active_tasks: state.orchestrator.active_count(),
    })
}
