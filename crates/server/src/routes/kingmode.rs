use std::collections::HashSet;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use hub_core::{PhasePlan, Session, SessionStatus};
use orchestrator::OrchestratorError;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

/// Documented shape of a kingmode request. Any other fields are forwarded to
/// the workers untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct KingmodeRequest {
    pub prompt: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub context: Option<Value>,
    /// Phase names to run instead of the configured plan.
    pub plan: Option<Vec<String>>,
}

#[utoipa::path(
    post,
    path = "/api/v1/kingmode",
    request_body = KingmodeRequest,
    responses(
        (status = 200, description = "Session finished; inspect each worker outcome for partial failures", body = Session),
        (status = 400, description = "Malformed body or unknown phase", body = ErrorResponse),
        (status = 500, description = "Session aborted; partial results attached", body = ErrorResponse),
    ),
    tag = "orchestration"
)]
pub async fn run_kingmode(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Session>, AppError> {
    let Json(body) = payload?;
    let Value::Object(mut input) = body else {
        return Err(AppError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ));
    };

    let plan = match input.remove("plan") {
        None | Some(Value::Null) => state.default_plan.clone(),
        Some(value) => serde_json::from_value::<Vec<String>>(value)
            .map(PhasePlan::new)
            .map_err(|_| AppError::BadRequest("plan must be an array of phase names".to_string()))?,
    };
    if plan.is_empty() {
        return Err(AppError::BadRequest(
            "plan must name at least one phase".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    if let Some(repeated) = plan.iter().find(|name| !seen.insert(*name)) {
        return Err(AppError::BadRequest(format!(
            "plan names phase {} more than once",
            repeated
        )));
    }
    if let Some(missing) = plan
        .iter()
        .find(|name| state.orchestrator.phases().resolve(name).is_none())
    {
        return Err(OrchestratorError::UnknownPhase(missing.to_string()).into());
    }

    let session = state
        .orchestrator
        .run_phase_plan(Session::generate_id(), plan, Value::Object(input))
        .await;

    if session.status == SessionStatus::Failed {
        return Err(AppError::SessionFailed(Box::new(session)));
    }
    Ok(Json(session))
}
