//! Resilient client for calls to remote workers.
//!
//! - [`WorkerCaller`] - the seam the engine and router call through
//! - [`WorkerClient`] - reqwest implementation with retry, backoff and
//!   correlation ids
//! - [`RetryPolicy`] / [`CallOptions`] - per-call retry and timeout settings

mod policy;
mod worker_client;

pub use policy::*;
pub use worker_client::{WorkerCaller, WorkerClient, CORRELATION_HEADER, TASK_ID_HEADER};
