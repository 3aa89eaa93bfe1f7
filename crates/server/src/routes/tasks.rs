use axum::extract::State;
use axum::Json;
use hub_core::{ActiveCall, CompletedCall};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct ActiveTasksResponse {
    pub tasks: Vec<ActiveCall>,
    pub count: usize,
}

#[derive(Serialize, ToSchema)]
pub struct TaskHistoryResponse {
    pub tasks: Vec<CompletedCall>,
    pub count: usize,
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/active",
    responses(
        (status = 200, description = "Direct calls in flight, oldest first", body = ActiveTasksResponse)
    ),
    tag = "tasks"
)]
pub async fn list_active_tasks(State(state): State<AppState>) -> Json<ActiveTasksResponse> {
    let tasks = state.orchestrator.active_calls();
    Json(ActiveTasksResponse {
        count: tasks.len(),
        tasks,
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/history",
    responses(
        (status = 200, description = "Recently finished direct calls, newest last", body = TaskHistoryResponse)
    ),
    tag = "tasks"
)]
pub async fn list_task_history(State(state): State<AppState>) -> Json<TaskHistoryResponse> {
    let tasks = state.orchestrator.history();
    Json(TaskHistoryResponse {
        count: tasks.len(),
        tasks,
    })
}
