use std::time::Duration;

use hub_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

/// Terminal failure of one outbound worker call, after any retries.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("Unknown worker: {worker}")]
    UnknownWorker { worker: String },

    #[error("Worker {worker} unreachable after {attempts} attempt(s) [{correlation_id}]: {message}")]
    Transport {
        worker: String,
        correlation_id: Uuid,
        attempts: u32,
        message: String,
    },

    #[error("Worker {worker} failed with status {status} after {attempts} attempt(s) [{correlation_id}]: {body}")]
    Status {
        worker: String,
        correlation_id: Uuid,
        attempts: u32,
        status: u16,
        body: String,
    },

    #[error("Worker {worker} timed out after {}ms ({attempts} attempt(s)) [{correlation_id}]", .timeout.as_millis())]
    Timeout {
        worker: String,
        correlation_id: Uuid,
        attempts: u32,
        timeout: Duration,
    },

    #[error("Worker {worker} returned an unreadable body [{correlation_id}]: {message}")]
    Decode {
        worker: String,
        correlation_id: Uuid,
        status: u16,
        message: String,
    },
}

impl CallError {
    /// Correlation id of the failed call. Unknown workers fail before an id
    /// is attached.
    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            Self::UnknownWorker { .. } => None,
            Self::Transport { correlation_id, .. }
            | Self::Status { correlation_id, .. }
            | Self::Timeout { correlation_id, .. }
            | Self::Decode { correlation_id, .. } => Some(*correlation_id),
        }
    }

    /// HTTP status returned by the worker, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::UnknownWorker { .. } => 0,
            Self::Decode { .. } => 1,
            Self::Transport { attempts, .. }
            | Self::Status { attempts, .. }
            | Self::Timeout { attempts, .. } => *attempts,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error(transparent)]
    Call(CallError),

    #[error("Intent classification failed: {0}")]
    ClassificationFailure(#[source] CallError),

    #[error("Task already in progress: {0}")]
    TaskInProgress(String),

    #[error(transparent)]
    InvalidTransition(#[from] CoreError),

    #[error("Orchestration error: {0}")]
    Internal(String),
}

impl From<CallError> for OrchestratorError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::UnknownWorker { worker } => Self::UnknownWorker(worker),
            other => Self::Call(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
