use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hub_core::{WorkerRequest, WorkerResponse};
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::policy::CallOptions;
use crate::error::CallError;
use crate::registry::AgentRegistry;

pub const CORRELATION_HEADER: &str = "x-correlation-id";
pub const TASK_ID_HEADER: &str = "x-task-id";

/// One outbound call to a named worker.
///
/// Implementations hide retries from callers and must be safe to share across
/// concurrently running sessions.
#[async_trait]
pub trait WorkerCaller: Send + Sync {
    async fn call(
        &self,
        worker: &str,
        request: &WorkerRequest,
        options: &CallOptions,
    ) -> Result<WorkerResponse, CallError>;
}

/// Why a single attempt failed.
enum AttemptFailure {
    Transport(String),
    Timeout,
    Status(u16, String),
    Decode(u16, String),
}

impl AttemptFailure {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// A worker that answered 2xx with garbage will not improve on retry.
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Decode(..))
    }

    fn into_call_error(
        self,
        worker: &str,
        correlation_id: Uuid,
        attempts: u32,
        timeout: Duration,
    ) -> CallError {
        let worker = worker.to_string();
        match self {
            Self::Transport(message) => CallError::Transport {
                worker,
                correlation_id,
                attempts,
                message,
            },
            Self::Timeout => CallError::Timeout {
                worker,
                correlation_id,
                attempts,
                timeout,
            },
            Self::Status(status, body) => CallError::Status {
                worker,
                correlation_id,
                attempts,
                status,
                body,
            },
            Self::Decode(status, message) => CallError::Decode {
                worker,
                correlation_id,
                status,
                message,
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Transport(message) => message.clone(),
            Self::Timeout => "timed out".to_string(),
            Self::Status(status, _) => format!("status {}", status),
            Self::Decode(_, message) => message.clone(),
        }
    }
}

/// HTTP client for the worker `/process` contract.
///
/// Holds no per-call state: the correlation id, attempt counter and backoff
/// all live on the stack of [`WorkerCaller::call`].
#[derive(Clone)]
pub struct WorkerClient {
    client: Client,
    agents: Arc<AgentRegistry>,
}

impl WorkerClient {
    pub fn new(agents: Arc<AgentRegistry>) -> Self {
        Self::with_client(agents, Client::new())
    }

    pub fn with_client(agents: Arc<AgentRegistry>, client: Client) -> Self {
        Self { client, agents }
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    async fn attempt(
        &self,
        url: &str,
        method: Method,
        correlation_id: Uuid,
        request: &WorkerRequest,
        timeout: Duration,
    ) -> Result<(u16, Value), AttemptFailure> {
        let response = self
            .client
            .request(method, url)
            .header(CORRELATION_HEADER, correlation_id.to_string())
            .header(TASK_ID_HEADER, &request.task_id)
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(AttemptFailure::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(AttemptFailure::from_reqwest)?;

        if !status.is_success() {
            return Err(AttemptFailure::Status(status.as_u16(), body));
        }

        if body.trim().is_empty() {
            return Ok((status.as_u16(), Value::Null));
        }

        serde_json::from_str(&body)
            .map(|value| (status.as_u16(), value))
            .map_err(|e| AttemptFailure::Decode(status.as_u16(), e.to_string()))
    }
}

#[async_trait]
impl WorkerCaller for WorkerClient {
    async fn call(
        &self,
        worker: &str,
        request: &WorkerRequest,
        options: &CallOptions,
    ) -> Result<WorkerResponse, CallError> {
        let base_url = self
            .agents
            .resolve(worker)
            .ok_or_else(|| CallError::UnknownWorker {
                worker: worker.to_string(),
            })?;
        let url = format!("{}/process", base_url);

        let correlation_id = Uuid::new_v4();
        let retryable = options.is_retryable();
        let max_attempts = if retryable {
            options.policy.max_attempts.max(1)
        } else {
            1
        };

        debug!(
            worker = %worker,
            task_id = %request.task_id,
            correlation_id = %correlation_id,
            max_attempts,
            "Calling worker"
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .attempt(
                    &url,
                    options.method.clone(),
                    correlation_id,
                    request,
                    options.timeout,
                )
                .await
            {
                Ok((status, result)) => {
                    debug!(
                        worker = %worker,
                        correlation_id = %correlation_id,
                        attempt,
                        status,
                        "Worker call succeeded"
                    );
                    return Ok(WorkerResponse {
                        worker: worker.to_string(),
                        task_id: request.task_id.clone(),
                        correlation_id,
                        status,
                        attempts: attempt,
                        result,
                    });
                }
                Err(failure) => {
                    if !(retryable && failure.is_retryable() && attempt < max_attempts) {
                        warn!(
                            worker = %worker,
                            correlation_id = %correlation_id,
                            attempt,
                            error = %failure.describe(),
                            "Worker call failed"
                        );
                        return Err(failure.into_call_error(
                            worker,
                            correlation_id,
                            attempt,
                            options.timeout,
                        ));
                    }

                    let delay = options.policy.backoff(attempt - 1);
                    warn!(
                        worker = %worker,
                        correlation_id = %correlation_id,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.describe(),
                        "Worker call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
