pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "KingMode Hub API",
        version = "0.1.0",
        description = "Phase-based orchestration of remote worker agents"
    ),
    paths(
        routes::health_check,
        routes::list_agents,
        routes::list_phases,
        routes::run_kingmode,
        routes::run_agent,
        routes::orchestrate,
        routes::list_active_tasks,
        routes::list_task_history,
        routes::sse::events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::AgentsResponse,
        routes::PhasesResponse,
        routes::KingmodeRequest,
        routes::OrchestrateRequest,
        routes::OrchestrateResponse,
        routes::ActiveTasksResponse,
        routes::TaskHistoryResponse,
        error::ErrorResponse,
        hub_core::Session,
        hub_core::SessionStatus,
        hub_core::PhaseDefinition,
        hub_core::PhaseOutcome,
        hub_core::WorkerOutcome,
        hub_core::WorkerStatus,
        hub_core::WorkerRequest,
        hub_core::WorkerResponse,
        hub_core::ActiveCall,
        hub_core::CompletedCall,
        hub_core::CallStatus,
        events::EventEnvelope,
        events::Event,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "agents", description = "Worker and phase registries"),
        (name = "orchestration", description = "Kingmode, direct and auto-routed execution"),
        (name = "tasks", description = "Direct call introspection"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/", get(routes::health_check))
        .route("/health", get(routes::health_check))
        .route("/api/v1/agents", get(routes::list_agents))
        .route("/api/v1/phases", get(routes::list_phases))
        .route("/api/v1/kingmode", post(routes::run_kingmode))
        .route("/api/v1/agent/{worker_name}", post(routes::run_agent))
        .route("/api/v1/orchestrate", post(routes::orchestrate))
        .route("/api/v1/tasks/active", get(routes::list_active_tasks))
        .route("/api/v1/tasks/history", get(routes::list_task_history))
        .route("/api/v1/events", get(routes::sse::events_stream))
        .fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
