use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// Body POSTed to a worker's `/process` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRequest {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[schema(value_type = Object)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub context: Option<Value>,
}

impl WorkerRequest {
    pub fn new(task_id: impl Into<String>, input: Value) -> Self {
        Self {
            task_id: task_id.into(),
            phase: None,
            input,
            context: None,
        }
    }

    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Build a request from a caller-supplied task payload.
    ///
    /// `taskId`, `phase` and `context` are lifted out of the payload. The
    /// payload's `input` field becomes the input when present; otherwise the
    /// remaining payload is forwarded whole.
    pub fn from_task(default_task_id: impl Into<String>, payload: Value) -> Self {
        let mut fields = match payload {
            Value::Object(map) => map,
            other => return Self::new(default_task_id, other),
        };

        let task_id = match fields.remove("taskId") {
            Some(Value::String(id)) if !id.is_empty() => id,
            _ => default_task_id.into(),
        };
        let phase = match fields.remove("phase") {
            Some(Value::String(phase)) => Some(phase),
            _ => None,
        };
        let context = fields.remove("context").filter(|c| !c.is_null());
        let input = match fields.remove("input") {
            Some(input) => input,
            None => Value::Object(fields),
        };

        Self {
            task_id,
            phase,
            input,
            context,
        }
    }
}

/// Successful reply from a worker. `result` is the worker's opaque body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    pub worker: String,
    pub task_id: String,
    pub correlation_id: Uuid,
    pub status: u16,
    pub attempts: u32,
    #[schema(value_type = Object)]
    pub result: Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Running,
    Succeeded,
    Failed,
}

/// A direct call currently in flight.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCall {
    pub task_id: String,
    pub worker: String,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
}

impl ActiveCall {
    pub fn new(task_id: impl Into<String>, worker: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            worker: worker.into(),
            status: CallStatus::Running,
            started_at: Utc::now(),
        }
    }

    pub fn finish(
        self,
        outcome: std::result::Result<Uuid, (Option<Uuid>, String)>,
    ) -> CompletedCall {
        let (status, correlation_id, error) = match outcome {
            Ok(id) => (CallStatus::Succeeded, Some(id), None),
            Err((id, message)) => (CallStatus::Failed, id, Some(message)),
        };
        CompletedCall {
            task_id: self.task_id,
            worker: self.worker,
            status,
            correlation_id,
            error,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}

/// History entry for a finished direct call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletedCall {
    pub task_id: String,
    pub worker: String,
    pub status: CallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}
