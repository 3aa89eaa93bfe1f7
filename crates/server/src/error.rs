use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hub_core::Session;
use orchestrator::{CallError, OrchestratorError};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Orchestrator(OrchestratorError),
    /// A session that stopped before running its whole plan.
    SessionFailed(Box<Session>),
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Option<Uuid>) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            AppError::SessionFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "session_failed", None)
            }
            AppError::Orchestrator(err) => match err {
                OrchestratorError::UnknownWorker(_) => {
                    (StatusCode::NOT_FOUND, "unknown_worker", None)
                }
                OrchestratorError::UnknownPhase(_) => {
                    (StatusCode::BAD_REQUEST, "unknown_phase", None)
                }
                OrchestratorError::Call(call) => {
                    let (status, kind) = call_status(call);
                    (status, kind, call.correlation_id())
                }
                OrchestratorError::ClassificationFailure(call) => (
                    StatusCode::BAD_GATEWAY,
                    "classification_failure",
                    call.correlation_id(),
                ),
                OrchestratorError::TaskInProgress(_) => {
                    (StatusCode::CONFLICT, "task_in_progress", None)
                }
                OrchestratorError::InvalidTransition(_) | OrchestratorError::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
                }
            },
        }
    }
}

fn call_status(call: &CallError) -> (StatusCode, &'static str) {
    match call {
        CallError::UnknownWorker { .. } => (StatusCode::NOT_FOUND, "unknown_worker"),
        CallError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
        CallError::Transport { .. } | CallError::Status { .. } | CallError::Decode { .. } => {
            (StatusCode::BAD_GATEWAY, "upstream_error")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, correlation_id) = self.parts();

        if status.is_server_error() {
            tracing::error!(kind, error = ?self, "Request failed");
        } else {
            tracing::debug!(kind, error = ?self, "Request rejected");
        }

        let (message, session) = match self {
            AppError::BadRequest(msg) => (msg, None),
            AppError::Orchestrator(err) => (err.to_string(), None),
            AppError::SessionFailed(session) => (
                session
                    .error
                    .clone()
                    .unwrap_or_else(|| "Session failed".to_string()),
                Some(*session),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            kind: kind.to_string(),
            correlation_id,
            session,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
