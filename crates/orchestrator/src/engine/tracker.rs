//! Bookkeeping for direct calls: what is in flight and what recently finished.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use hub_core::{ActiveCall, CompletedCall};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Shared across every concurrently running direct call, hence the mutexes.
#[derive(Debug)]
pub struct CallTracker {
    active: Mutex<HashMap<String, ActiveCall>>,
    history: Mutex<VecDeque<CompletedCall>>,
    history_limit: usize,
}

impl CallTracker {
    pub fn new(history_limit: usize) -> Self {
        Self {
            active: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(history_limit.min(1024))),
            history_limit,
        }
    }

    /// Register a call as in flight. The returned guard removes it again.
    pub fn begin(self: &Arc<Self>, task_id: &str, worker: &str) -> Result<CallGuard> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if active.contains_key(task_id) {
            return Err(OrchestratorError::TaskInProgress(task_id.to_string()));
        }
        active.insert(task_id.to_string(), ActiveCall::new(task_id, worker));
        debug!(task_id = %task_id, worker = %worker, "Tracking direct call");

        Ok(CallGuard {
            tracker: Arc::clone(self),
            task_id: task_id.to_string(),
            finished: false,
        })
    }

    pub fn active(&self) -> Vec<ActiveCall> {
        let mut calls: Vec<ActiveCall> = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect();
        calls.sort_by_key(|c| c.started_at);
        calls
    }

    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<CompletedCall> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    fn finish(&self, task_id: &str, outcome: std::result::Result<Uuid, (Option<Uuid>, String)>) {
        let call = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(task_id);

        let Some(call) = call else {
            return;
        };

        if self.history_limit == 0 {
            return;
        }
        let mut history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(call.finish(outcome));
    }
}

impl Default for CallTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

/// Keeps a direct call in the active table until it is resolved.
///
/// Dropping the guard unresolved (the request future was cancelled) still
/// clears the entry and records the call as failed.
#[derive(Debug)]
pub struct CallGuard {
    tracker: Arc<CallTracker>,
    task_id: String,
    finished: bool,
}

impl CallGuard {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn succeed(mut self, correlation_id: Uuid) {
        self.tracker.finish(&self.task_id, Ok(correlation_id));
        self.finished = true;
    }

    pub fn fail(mut self, correlation_id: Option<Uuid>, error: impl Into<String>) {
        self.tracker
            .finish(&self.task_id, Err((correlation_id, error.into())));
        self.finished = true;
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!(task_id = %self.task_id, "Direct call dropped before completion");
            self.tracker.finish(
                &self.task_id,
                Err((None, "call cancelled before completion".to_string())),
            );
        }
    }
}
