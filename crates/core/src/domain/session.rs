use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;
use uuid::Uuid;

use super::phase::{PhaseOutcome, PhasePlan};
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Phase outcomes in execution order, serialized as a JSON object keyed by
/// phase name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseResults(Vec<PhaseOutcome>);

impl PhaseResults {
    pub fn get(&self, phase_name: &str) -> Option<&PhaseOutcome> {
        self.0.iter().find(|o| o.phase_name == phase_name)
    }

    pub fn contains(&self, phase_name: &str) -> bool {
        self.get(phase_name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|o| o.phase_name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhaseOutcome> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for PhaseResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for outcome in &self.0 {
            map.serialize_entry(&outcome.phase_name, outcome)?;
        }
        map.end()
    }
}

/// One end-to-end orchestration run.
///
/// Status only moves forward: `running → completed` or `running → failed`.
/// Phase results are append-only and survive a failure for diagnostics.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub plan: PhasePlan,
    pub status: SessionStatus,
    #[schema(value_type = Object)]
    pub phase_results: PhaseResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, plan: PhasePlan) -> Self {
        Self {
            session_id: session_id.into(),
            plan,
            status: SessionStatus::Running,
            phase_results: PhaseResults::default(),
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// `km_<unix millis>_<8 hex chars>`
    pub fn generate_id() -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("km_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
    }

    pub fn record_phase(&mut self, outcome: PhaseOutcome) -> Result<()> {
        self.ensure_running(SessionStatus::Running)?;
        if self.phase_results.contains(&outcome.phase_name) {
            return Err(CoreError::DuplicatePhase(outcome.phase_name));
        }
        self.phase_results.0.push(outcome);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        self.ensure_running(SessionStatus::Completed)?;
        self.status = SessionStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.ensure_running(SessionStatus::Failed)?;
        self.status = SessionStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_running(&self, to: SessionStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidStatusTransition {
                session_id: self.session_id.clone(),
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::phase::{WorkerOutcome, AGENT, BRAINSTORM, FORMING};
    use serde_json::json;
    use std::time::Duration;

    fn outcome(name: &str) -> PhaseOutcome {
        PhaseOutcome::new(
            name,
            Duration::from_millis(5),
            vec![WorkerOutcome::fulfilled(
                "research",
                "t",
                Uuid::new_v4(),
                json!({"sources": ["a"]}),
            )],
        )
    }

    #[test]
    fn test_session_creation() {
        let session = Session::new("km_1_abcdef01", PhasePlan::kingmode());

        assert_eq!(session.status, SessionStatus::Running);
        assert!(session.phase_results.is_empty());
        assert!(session.error.is_none());
        assert!(session.completed_at.is_none());
    }

    #[test]
    fn test_generate_id_shape() {
        let id = Session::generate_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "km");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 8);
        assert_ne!(id, Session::generate_id());
    }

    #[test]
    fn test_session_lifecycle_completed() {
        let mut session = Session::new("s", PhasePlan::kingmode());
        session.record_phase(outcome(BRAINSTORM)).unwrap();
        session.complete().unwrap();

        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());
        assert!(session.fail("late").is_err());
        assert!(session.error.is_none());
    }

    #[test]
    fn test_failed_session_keeps_results() {
        let mut session = Session::new("s", PhasePlan::kingmode());
        session.record_phase(outcome(BRAINSTORM)).unwrap();
        session.fail("Unknown phase: FORMING").unwrap();

        assert_eq!(session.status, SessionStatus::Failed);
        assert_eq!(session.phase_results.len(), 1);
        assert!(session.complete().is_err());
        assert!(session.record_phase(outcome(FORMING)).is_err());
    }

    #[test]
    fn test_duplicate_phase_rejected() {
        let mut session = Session::new("s", PhasePlan::kingmode());
        session.record_phase(outcome(BRAINSTORM)).unwrap();
        let err = session.record_phase(outcome(BRAINSTORM)).unwrap_err();
        assert!(matches!(err, CoreError::DuplicatePhase(name) if name == BRAINSTORM));
    }

    #[test]
    fn test_phase_results_preserve_execution_order() {
        let mut session = Session::new("s", PhasePlan::kingmode());
        session.record_phase(outcome(AGENT)).unwrap();
        session.record_phase(outcome(BRAINSTORM)).unwrap();

        let names: Vec<&str> = session.phase_results.names().collect();
        assert_eq!(names, vec![AGENT, BRAINSTORM]);

        let json = serde_json::to_string(&session).unwrap();
        let agent_at = json.find("\"AGENT\":").unwrap();
        let brainstorm_at = json.find("\"BRAINSTORM\":").unwrap();
        assert!(agent_at < brainstorm_at);
    }

    #[test]
    fn test_session_serialization() {
        let mut session = Session::new("km_1_x", PhasePlan::kingmode());
        session.record_phase(outcome(BRAINSTORM)).unwrap();
        session.complete().unwrap();

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["sessionId"], "km_1_x");
        assert_eq!(value["status"], "completed");
        assert_eq!(
            value["phaseResults"]["BRAINSTORM"]["workerOutcomes"][0]["result"]["sources"][0],
            "a"
        );
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_status_parse_roundtrip() {
        for status in [
            SessionStatus::Running,
            SessionStatus::Completed,
            SessionStatus::Failed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("pending"), None);
    }
}
