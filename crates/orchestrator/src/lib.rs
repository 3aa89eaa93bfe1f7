pub mod client;
pub mod engine;
pub mod error;
pub mod intent;
pub mod registry;

pub use client::{CallOptions, RetryPolicy, WorkerCaller, WorkerClient};
pub use engine::{AutoRouted, EngineConfig, Orchestrator};
pub use error::{CallError, OrchestratorError, Result};
pub use intent::{Classification, IntentRouter, IntentTable};
pub use registry::{AgentRegistry, PhaseRegistry};
