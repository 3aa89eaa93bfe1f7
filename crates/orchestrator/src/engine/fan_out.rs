//! Concurrent fan-out of one phase to its workers.
//!
//! Each worker call runs in its own task and reports `(index, outcome)` on a
//! shared channel. The phase collects exactly one result per worker or stops
//! waiting at the phase deadline; anything still missing is recorded as a
//! timeout. Calls left running are not aborted here, the client's own per-call
//! timeout ends them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use events::{Event, EventBus};
use hub_core::{PhaseDefinition, PhaseOutcome, WorkerOutcome, WorkerRequest, WorkerStatus};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{CallOptions, WorkerCaller};
use crate::error::{OrchestratorError, Result};

/// Per-call timeout used inside a phase: never more than 90% of the phase
/// budget, so a single attempt cannot outlive the phase.
pub fn phase_call_timeout(configured: Duration, max_duration: Duration) -> Duration {
    configured.min(max_duration.mul_f64(0.9))
}

pub(crate) struct PhaseRun<'a> {
    pub session_id: &'a str,
    pub phase: &'a PhaseDefinition,
    pub input: &'a Value,
    pub context: Option<Value>,
    pub options: &'a CallOptions,
}

pub(crate) async fn run_phase(
    caller: &Arc<dyn WorkerCaller>,
    run: PhaseRun<'_>,
    events: Option<&EventBus>,
) -> Result<PhaseOutcome> {
    let PhaseRun {
        session_id,
        phase,
        input,
        context,
        options,
    } = run;

    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + phase.max_duration;
    let worker_count = phase.worker_names.len();
    let options = options
        .clone()
        .with_timeout(phase_call_timeout(options.timeout, phase.max_duration));

    info!(
        session_id = %session_id,
        phase = %phase.name,
        workers = worker_count,
        max_duration_ms = phase.max_duration.as_millis() as u64,
        "Fanning out phase"
    );

    let (tx, mut rx) = mpsc::channel::<(usize, WorkerOutcome)>(worker_count.max(1));

    for (index, worker) in phase.worker_names.iter().enumerate() {
        let task_id = phase.task_id(session_id, worker);
        let mut request =
            WorkerRequest::new(task_id.clone(), input.clone()).with_phase(&phase.name);
        if let Some(ref context) = context {
            request = request.with_context(context.clone());
        }

        let tx = tx.clone();
        let caller = Arc::clone(caller);
        let options = options.clone();
        let worker = worker.clone();

        tokio::spawn(async move {
            let outcome = match caller.call(&worker, &request, &options).await {
                Ok(response) => WorkerOutcome::fulfilled(
                    &worker,
                    task_id,
                    response.correlation_id,
                    response.result,
                ),
                Err(e) if e.is_timeout() => {
                    WorkerOutcome::rejected(&worker, task_id, e.correlation_id(), e.to_string())
                        .into_timeout()
                }
                Err(e) => {
                    WorkerOutcome::rejected(&worker, task_id, e.correlation_id(), e.to_string())
                }
            };
            // The phase may already have stopped listening.
            if tx.send((index, outcome)).await.is_err() {
                debug!(worker = %worker, "Worker resolved after phase deadline");
            }
        });
    }
    drop(tx);

    let mut slots: Vec<Option<WorkerOutcome>> = vec![None; worker_count];
    let mut resolved = 0;

    while resolved < worker_count {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some((index, outcome))) => {
                emit_worker_event(events, session_id, &phase.name, &outcome);
                if slots[index].replace(outcome).is_none() {
                    resolved += 1;
                }
            }
            Ok(None) => {
                let lost: Vec<&str> = slots
                    .iter()
                    .zip(&phase.worker_names)
                    .filter(|(slot, _)| slot.is_none())
                    .map(|(_, worker)| worker.as_str())
                    .collect();
                return Err(OrchestratorError::Internal(format!(
                    "phase {} lost results for worker(s): {}",
                    phase.name,
                    lost.join(", ")
                )));
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    phase = %phase.name,
                    resolved,
                    expected = worker_count,
                    "Phase deadline reached with unresolved workers"
                );
                break;
            }
        }
    }

    let worker_outcomes: Vec<WorkerOutcome> = slots
        .into_iter()
        .zip(&phase.worker_names)
        .map(|(slot, worker)| {
            slot.unwrap_or_else(|| {
                let outcome = WorkerOutcome::timed_out(
                    worker,
                    phase.task_id(session_id, worker),
                    phase.max_duration,
                );
                emit_worker_event(events, session_id, &phase.name, &outcome);
                outcome
            })
        })
        .collect();

    let outcome = PhaseOutcome::new(&phase.name, started.elapsed(), worker_outcomes);
    info!(
        session_id = %session_id,
        phase = %phase.name,
        fulfilled = outcome.fulfilled_count(),
        total = worker_count,
        duration_ms = outcome.duration_observed.as_millis() as u64,
        "Phase resolved"
    );

    Ok(outcome)
}

fn emit_worker_event(
    events: Option<&EventBus>,
    session_id: &str,
    phase: &str,
    outcome: &WorkerOutcome,
) {
    if outcome.status != WorkerStatus::Fulfilled {
        warn!(
            session_id = %session_id,
            phase = %phase,
            worker = %outcome.worker_name,
            status = outcome.status.as_str(),
            error = outcome.error_message.as_deref().unwrap_or_default(),
            "Worker did not fulfil"
        );
    }

    let Some(bus) = events else {
        return;
    };

    let event = match outcome.status {
        WorkerStatus::Fulfilled => Event::Artifact {
            session_id: session_id.to_string(),
            phase: Some(phase.to_string()),
            worker: outcome.worker_name.clone(),
            task_id: outcome.task_id.clone(),
            result: outcome.result.clone().unwrap_or(Value::Null),
        },
        WorkerStatus::Rejected | WorkerStatus::Timeout => Event::Error {
            session_id: Some(session_id.to_string()),
            phase: Some(phase.to_string()),
            worker: Some(outcome.worker_name.clone()),
            message: outcome
                .error_message
                .clone()
                .unwrap_or_else(|| outcome.status.as_str().to_string()),
        },
    };
    bus.publish(event);
}
