//! Event types emitted while a session runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Position in the bus's stream, starting at 1; 0 until published
    pub sequence: u64,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// Progress of an orchestration session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Narration of what the orchestrator is about to do
    Thought {
        session_id: String,
        phase: Option<String>,
        message: String,
    },

    /// A worker produced a result
    Artifact {
        session_id: String,
        phase: Option<String>,
        worker: String,
        task_id: String,
        #[schema(value_type = Object)]
        result: Value,
    },

    /// A worker failed, timed out, or the session aborted
    Error {
        session_id: Option<String>,
        phase: Option<String>,
        worker: Option<String>,
        message: String,
    },

    /// The session reached a terminal state
    Completion {
        session_id: String,
        status: String,
        phases_executed: usize,
    },
}

impl Event {
    pub fn thought(session_id: &str, phase: Option<&str>, message: impl Into<String>) -> Self {
        Event::Thought {
            session_id: session_id.to_string(),
            phase: phase.map(str::to_string),
            message: message.into(),
        }
    }

    /// Get the session ID associated with this event, if any
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Event::Thought { session_id, .. } => Some(session_id),
            Event::Artifact { session_id, .. } => Some(session_id),
            Event::Error { session_id, .. } => session_id.as_deref(),
            Event::Completion { session_id, .. } => Some(session_id),
        }
    }

    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Thought { .. } => "thought",
            Event::Artifact { .. } => "artifact",
            Event::Error { .. } => "error",
            Event::Completion { .. } => "completion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_envelope_creation() {
        let envelope = EventEnvelope::new(Event::thought("km_1", None, "starting"));

        assert!(!envelope.id.is_nil());
        assert_eq!(envelope.sequence, 0);
        assert!(envelope.timestamp <= Utc::now());
        assert_eq!(envelope.with_sequence(7).sequence, 7);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::Artifact {
            session_id: "km_1".to_string(),
            phase: Some("BRAINSTORM".to_string()),
            worker: "research".to_string(),
            task_id: "km_1_BRAINSTORM_research".to_string(),
            result: json!({"sources": ["a", "b"]}),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "artifact");
        assert_eq!(value["worker"], "research");
        assert_eq!(value["result"]["sources"][1], "b");
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"completion","session_id":"km_9","status":"completed","phases_executed":3}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        match event {
            Event::Completion {
                session_id,
                status,
                phases_executed,
            } => {
                assert_eq!(session_id, "km_9");
                assert_eq!(status, "completed");
                assert_eq!(phases_executed, 3);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_session_id() {
        assert_eq!(Event::thought("km_2", None, "x").session_id(), Some("km_2"));

        let detached = Event::Error {
            session_id: None,
            phase: None,
            worker: Some("nlu".to_string()),
            message: "down".to_string(),
        };
        assert_eq!(detached.session_id(), None);
        assert_eq!(detached.event_type(), "error");
    }
}
