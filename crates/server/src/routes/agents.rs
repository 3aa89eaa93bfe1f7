use axum::extract::State;
use axum::Json;
use hub_core::PhaseDefinition;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct AgentsResponse {
    pub agents: Vec<String>,
    pub count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct PhasesResponse {
    pub phases: Vec<PhaseDefinition>,
    pub plan: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/agents",
    responses(
        (status = 200, description = "Registered workers", body = AgentsResponse)
    ),
    tag = "agents"
)]
pub async fn list_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    let agents: Vec<String> = state
        .orchestrator
        .agents()
        .names()
        .map(str::to_string)
        .collect();
    Json(AgentsResponse {
        count: agents.len(),
        agents,
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/phases",
    responses(
        (status = 200, description = "Phase definitions and the default plan", body = PhasesResponse)
    ),
    tag = "agents"
)]
pub async fn list_phases(State(state): State<AppState>) -> Json<PhasesResponse> {
    Json(PhasesResponse {
        phases: state.orchestrator.phases().definitions().to_vec(),
        plan: state.default_plan.as_slice().to_vec(),
    })
}
