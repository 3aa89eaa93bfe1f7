//! The phase engine.
//!
//! [`Orchestrator`] drives a session through an ordered phase plan, fanning
//! each phase out to its workers and threading every earlier phase's outcome
//! into the next one. It also serves single-worker direct calls and
//! intent-routed calls.

mod fan_out;
mod tracker;

pub use fan_out::phase_call_timeout;
pub use tracker::{CallGuard, CallTracker, DEFAULT_HISTORY_LIMIT};

use std::sync::Arc;

use events::{Event, EventBus};
use hub_core::{
    ActiveCall, CompletedCall, CoreError, PhasePlan, PhaseResults, Session, WorkerRequest,
    WorkerResponse,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::{CallOptions, WorkerCaller, WorkerClient};
use crate::error::{OrchestratorError, Result};
use crate::intent::{IntentRouter, IntentTable};
use crate::registry::{AgentRegistry, PhaseRegistry};
use fan_out::PhaseRun;

/// Tunables for an [`Orchestrator`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Options for phase fan-out calls. The timeout is further clamped below
    /// each phase's budget.
    pub phase_options: CallOptions,
    /// Options for direct and auto-routed calls.
    pub direct_options: CallOptions,
    /// Options for the classification call.
    pub classify_options: CallOptions,
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            phase_options: CallOptions::mutating(),
            direct_options: CallOptions::mutating(),
            classify_options: CallOptions::read(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Result of [`Orchestrator::run_auto_routed`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRouted {
    pub intent: String,
    pub nlu_result: Value,
    pub worker: String,
    pub result: WorkerResponse,
}

pub struct Orchestrator {
    caller: Arc<dyn WorkerCaller>,
    agents: Arc<AgentRegistry>,
    phases: Arc<PhaseRegistry>,
    router: IntentRouter,
    config: EngineConfig,
    tracker: Arc<CallTracker>,
    events: Option<EventBus>,
}

impl Orchestrator {
    /// Orchestrator talking HTTP to the workers in `agents`.
    pub fn new(agents: Arc<AgentRegistry>, phases: Arc<PhaseRegistry>) -> Self {
        let caller: Arc<dyn WorkerCaller> = Arc::new(WorkerClient::new(Arc::clone(&agents)));
        Self::with_caller(caller, agents, phases)
    }

    pub fn with_caller(
        caller: Arc<dyn WorkerCaller>,
        agents: Arc<AgentRegistry>,
        phases: Arc<PhaseRegistry>,
    ) -> Self {
        let config = EngineConfig::default();
        Self {
            router: IntentRouter::new(Arc::clone(&caller))
                .with_options(config.classify_options.clone()),
            tracker: Arc::new(CallTracker::new(config.history_limit)),
            caller,
            agents,
            phases,
            config,
            events: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.router = self.router.with_options(config.classify_options.clone());
        self.tracker = Arc::new(CallTracker::new(config.history_limit));
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn with_intent_table(mut self, table: IntentTable) -> Self {
        self.router = self.router.with_table(table);
        self
    }

    pub fn with_classifier(mut self, worker: impl Into<String>) -> Self {
        self.router = self.router.with_classifier(worker);
        self
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn phases(&self) -> &PhaseRegistry {
        &self.phases
    }

    pub fn active_calls(&self) -> Vec<ActiveCall> {
        self.tracker.active()
    }

    pub fn active_count(&self) -> usize {
        self.tracker.active_count()
    }

    pub fn history(&self) -> Vec<CompletedCall> {
        self.tracker.history()
    }

    /// Run the standard plan under a freshly generated session id.
    pub async fn run_kingmode(&self, input: Value) -> Session {
        self.run_phase_plan(Session::generate_id(), PhasePlan::kingmode(), input)
            .await
    }

    /// Drive a session through `plan`.
    ///
    /// Worker failures never fail the session; they are recorded in the
    /// phase outcome. An unknown phase or worker, or a fan-out that loses
    /// track of its workers, stops the run and marks the session failed with
    /// the phases executed so far kept in place.
    pub async fn run_phase_plan(
        &self,
        session_id: impl Into<String>,
        plan: PhasePlan,
        input: Value,
    ) -> Session {
        let mut session = Session::new(session_id, plan.clone());
        info!(
            session_id = %session.session_id,
            phases = plan.len(),
            "Starting session"
        );
        self.emit(Event::thought(
            &session.session_id,
            None,
            format!("Running {} phase(s)", plan.len()),
        ));

        match self.drive(&mut session, &plan, &input).await {
            Ok(()) => {
                if let Err(e) = session.complete() {
                    warn!(
                        session_id = %session.session_id,
                        error = %e,
                        "Could not complete session"
                    );
                }
                info!(session_id = %session.session_id, "Session completed");
            }
            Err(e) => {
                error!(session_id = %session.session_id, error = %e, "Session failed");
                self.emit(Event::Error {
                    session_id: Some(session.session_id.clone()),
                    phase: None,
                    worker: None,
                    message: e.to_string(),
                });
                if let Err(e) = session.fail(e.to_string()) {
                    warn!(session_id = %session.session_id, error = %e, "Could not fail session");
                }
            }
        }

        self.emit(Event::Completion {
            session_id: session.session_id.clone(),
            status: session.status.as_str().to_string(),
            phases_executed: session.phase_results.len(),
        });
        session
    }

    async fn drive(&self, session: &mut Session, plan: &PhasePlan, input: &Value) -> Result<()> {
        for phase_name in plan.iter() {
            if session.phase_results.contains(phase_name) {
                return Err(CoreError::DuplicatePhase(phase_name.to_string()).into());
            }

            let phase = self
                .phases
                .resolve(phase_name)
                .ok_or_else(|| OrchestratorError::UnknownPhase(phase_name.to_string()))?;

            if let Some(missing) = phase
                .worker_names
                .iter()
                .find(|w| !self.agents.contains(w))
            {
                return Err(OrchestratorError::UnknownWorker(missing.clone()));
            }

            self.emit(Event::thought(
                &session.session_id,
                Some(phase_name),
                format!("Starting {} phase", phase_name),
            ));

            let context = phase_context(input, &session.phase_results)?;
            let outcome = fan_out::run_phase(
                &self.caller,
                PhaseRun {
                    session_id: &session.session_id,
                    phase,
                    input,
                    context,
                    options: &self.config.phase_options,
                },
                self.events.as_ref(),
            )
            .await?;

            session.record_phase(outcome)?;
        }
        Ok(())
    }

    /// Call one worker directly, bypassing phases.
    ///
    /// The call is listed among the active calls while in flight and lands
    /// in the bounded history once it resolves.
    pub async fn run_direct(&self, worker: &str, payload: Value) -> Result<WorkerResponse> {
        if !self.agents.contains(worker) {
            return Err(OrchestratorError::UnknownWorker(worker.to_string()));
        }

        let task_id = format!("task_{}", Uuid::new_v4().simple());
        let request = WorkerRequest::from_task(task_id, payload);
        let guard = self.tracker.begin(&request.task_id, worker)?;

        info!(task_id = %request.task_id, worker = %worker, "Direct call");
        match self
            .caller
            .call(worker, &request, &self.config.direct_options)
            .await
        {
            Ok(response) => {
                guard.succeed(response.correlation_id);
                Ok(response)
            }
            Err(e) => {
                guard.fail(e.correlation_id(), e.to_string());
                Err(e.into())
            }
        }
    }

    /// Classify `payload`, pick a worker for the intent and call it with the
    /// classification attached as context.
    pub async fn run_auto_routed(&self, payload: Value) -> Result<AutoRouted> {
        let classification = self.router.classify(&payload).await?;
        let worker = self.router.route(&classification.intent).to_string();

        let mut task = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("input".to_string(), other);
                map
            }
        };
        task.insert("context".to_string(), classification.raw.clone());

        let result = self.run_direct(&worker, Value::Object(task)).await?;

        Ok(AutoRouted {
            intent: classification.intent,
            nlu_result: classification.raw,
            worker,
            result,
        })
    }

    fn emit(&self, event: Event) {
        if let Some(ref bus) = self.events {
            bus.publish(event);
        }
    }
}

/// Context handed to the next phase: the caller's own `context` object (if
/// any) plus the outcome of every phase executed so far, keyed by phase name.
fn phase_context(input: &Value, results: &PhaseResults) -> Result<Option<Value>> {
    let mut context = match input.get("context") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            let mut map = Map::new();
            map.insert("caller".to_string(), other.clone());
            map
        }
    };

    for outcome in results.iter() {
        let value = serde_json::to_value(outcome).map_err(|e| {
            OrchestratorError::Internal(format!(
                "could not encode {} outcome: {}",
                outcome.phase_name, e
            ))
        })?;
        context.insert(outcome.phase_name.clone(), value);
    }

    Ok((!context.is_empty()).then_some(Value::Object(context)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{PhaseOutcome, WorkerOutcome, BRAINSTORM, FORMING};
    use serde_json::json;
    use std::time::Duration;

    fn results_with(names: &[&str]) -> PhaseResults {
        let mut session = Session::new("s", PhasePlan::kingmode());
        for name in names {
            session
                .record_phase(PhaseOutcome::new(
                    *name,
                    Duration::from_millis(1),
                    vec![WorkerOutcome::fulfilled("w", "t", Uuid::new_v4(), json!({"n": name}))],
                ))
                .unwrap();
        }
        session.phase_results
    }

    #[test]
    fn test_first_phase_has_no_context() {
        let context = phase_context(&json!({"prompt": "x"}), &PhaseResults::default()).unwrap();
        assert!(context.is_none());
    }

    #[test]
    fn test_context_is_cumulative() {
        let results = results_with(&[BRAINSTORM, FORMING]);
        let context = phase_context(&json!({"prompt": "x"}), &results)
            .unwrap()
            .unwrap();

        assert_eq!(
            context[BRAINSTORM]["workerOutcomes"][0]["result"]["n"],
            BRAINSTORM
        );
        assert_eq!(context[FORMING]["phaseName"], FORMING);
    }

    #[test]
    fn test_caller_context_is_kept() {
        let results = results_with(&[BRAINSTORM]);
        let context = phase_context(&json!({"context": {"repo": "hub"}}), &results)
            .unwrap()
            .unwrap();

        assert_eq!(context["repo"], "hub");
        assert!(context.get(BRAINSTORM).is_some());

        let scalar = phase_context(&json!({"context": "plain"}), &PhaseResults::default())
            .unwrap()
            .unwrap();
        assert_eq!(scalar["caller"], "plain");
    }
}
