use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;

pub const BRAINSTORM: &str = "BRAINSTORM";
pub const FORMING: &str = "FORMING";
pub const AGENT: &str = "AGENT";

/// Static configuration for one phase: which workers take part and how long
/// the phase may run before unresolved workers are recorded as timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDefinition {
    pub name: String,
    pub worker_names: Vec<String>,
    #[serde(rename = "maxDurationMs", with = "duration_ms")]
    #[schema(value_type = u64)]
    pub max_duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PhaseDefinition {
    pub fn new(
        name: impl Into<String>,
        worker_names: impl IntoIterator<Item = impl Into<String>>,
        max_duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            worker_names: worker_names.into_iter().map(Into::into).collect(),
            max_duration,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Correlation key for one worker call inside this phase.
    pub fn task_id(&self, session_id: &str, worker_name: &str) -> String {
        format!("{}_{}_{}", session_id, self.name, worker_name)
    }
}

/// Ordered list of phase names to run for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PhasePlan(Vec<String>);

impl PhasePlan {
    pub fn new(phases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(phases.into_iter().map(Into::into).collect())
    }

    /// The standard BRAINSTORM → FORMING → AGENT plan.
    pub fn kingmode() -> Self {
        Self::new([BRAINSTORM, FORMING, AGENT])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for PhasePlan {
    fn default() -> Self {
        Self::kingmode()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Fulfilled,
    Rejected,
    /// Did not resolve in time, either at the phase deadline or at the
    /// per-call timeout.
    Timeout,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fulfilled)
    }
}

/// Terminal state of a single worker call within a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WorkerOutcome {
    pub worker_name: String,
    pub task_id: String,
    pub status: WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
}

impl WorkerOutcome {
    pub fn fulfilled(
        worker_name: impl Into<String>,
        task_id: impl Into<String>,
        correlation_id: Uuid,
        result: Value,
    ) -> Self {
        Self {
            worker_name: worker_name.into(),
            task_id: task_id.into(),
            status: WorkerStatus::Fulfilled,
            result: Some(result),
            error_message: None,
            correlation_id: Some(correlation_id),
        }
    }

    pub fn rejected(
        worker_name: impl Into<String>,
        task_id: impl Into<String>,
        correlation_id: Option<Uuid>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            worker_name: worker_name.into(),
            task_id: task_id.into(),
            status: WorkerStatus::Rejected,
            result: None,
            error_message: Some(error_message.into()),
            correlation_id,
        }
    }

    pub fn timed_out(
        worker_name: impl Into<String>,
        task_id: impl Into<String>,
        after: Duration,
    ) -> Self {
        Self {
            worker_name: worker_name.into(),
            task_id: task_id.into(),
            status: WorkerStatus::Timeout,
            result: None,
            error_message: Some(format!(
                "worker did not respond within {}ms",
                after.as_millis()
            )),
            correlation_id: None,
        }
    }

    /// Reclassify a failed call as a timeout, keeping its message.
    pub fn into_timeout(mut self) -> Self {
        self.status = WorkerStatus::Timeout;
        self.result = None;
        self
    }
}

/// Record of one executed phase. Written once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseOutcome {
    pub phase_name: String,
    #[serde(rename = "durationObservedMs", with = "duration_ms")]
    #[schema(value_type = u64)]
    pub duration_observed: Duration,
    /// Same order as the phase's worker list, regardless of completion order.
    pub worker_outcomes: Vec<WorkerOutcome>,
}

impl PhaseOutcome {
    pub fn new(
        phase_name: impl Into<String>,
        duration_observed: Duration,
        worker_outcomes: Vec<WorkerOutcome>,
    ) -> Self {
        Self {
            phase_name: phase_name.into(),
            duration_observed,
            worker_outcomes,
        }
    }

    pub fn outcome_for(&self, worker_name: &str) -> Option<&WorkerOutcome> {
        self.worker_outcomes
            .iter()
            .find(|o| o.worker_name == worker_name)
    }

    pub fn fulfilled_count(&self) -> usize {
        self.worker_outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .count()
    }

    /// True when at least one worker failed or timed out.
    pub fn is_degraded(&self) -> bool {
        self.fulfilled_count() < self.worker_outcomes.len()
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
