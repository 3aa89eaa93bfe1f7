use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hub_core::{PhaseDefinition, PhasePlan};
use orchestrator::client::{
    CallOptions, RetryPolicy, DEFAULT_BACKOFF_CAP, DEFAULT_BASE_DELAY, DEFAULT_CALL_TIMEOUT,
    DEFAULT_MAX_ATTEMPTS, READ_MAX_ATTEMPTS,
};
use orchestrator::engine::DEFAULT_HISTORY_LIMIT;
use orchestrator::intent::{DEFAULT_CLASSIFIER, DEFAULT_FALLBACK_WORKER};
use orchestrator::registry::{default_worker_url, DEFAULT_WORKERS};
use orchestrator::{AgentRegistry, EngineConfig, IntentTable, PhaseRegistry};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

pub const DEFAULT_SERVICE_NAME: &str = "acheevy-hub";
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },

    #[error("Phase {phase} references unknown worker {worker}")]
    UnknownWorker { phase: String, worker: String },

    #[error("Intent {intent} routes to unknown worker {worker}")]
    UnknownIntentWorker { intent: String, worker: String },

    #[error("Plan references unknown phase {0}")]
    UnknownPhase(String),

    #[error("Plan names phase {0} more than once")]
    RepeatedPhase(String),

    #[error("Invalid phase {phase}: {reason}")]
    InvalidPhase { phase: String, reason: String },
}

/// Retry and timeout settings applied to every worker call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub backoff_cap_ms: u64,
    pub max_attempts: u32,
    pub read_max_attempts: u32,
    pub call_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP.as_millis() as u64,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            read_max_attempts: READ_MAX_ATTEMPTS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    fn tune(&self, policy: RetryPolicy) -> RetryPolicy {
        policy
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_backoff_cap(Duration::from_millis(self.backoff_cap_ms))
    }

    fn mutating_options(&self) -> CallOptions {
        CallOptions::mutating()
            .with_policy(self.tune(RetryPolicy::mutating().with_max_attempts(self.max_attempts)))
            .with_timeout(Duration::from_millis(self.call_timeout_ms))
    }

    fn read_options(&self) -> CallOptions {
        CallOptions::read()
            .with_policy(self.tune(RetryPolicy::read().with_max_attempts(self.read_max_attempts)))
            .with_timeout(Duration::from_millis(self.call_timeout_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntentConfig {
    pub classifier: String,
    pub fallback: String,
    pub routes: BTreeMap<String, String>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        let standard = IntentTable::standard();
        Self {
            classifier: DEFAULT_CLASSIFIER.to_string(),
            fallback: DEFAULT_FALLBACK_WORKER.to_string(),
            routes: standard
                .routes()
                .map(|(intent, worker)| (intent.to_string(), worker.to_string()))
                .collect(),
        }
    }
}

/// Hub configuration.
///
/// Every field has a default, so a config file only needs the keys it
/// changes. A `workers` or `phases` entry in the file replaces the whole
/// default table. Worker URLs from `II_<NAME>_URL` win over both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HubConfig {
    pub service: String,
    pub environment: String,
    pub port: u16,
    pub workers: BTreeMap<String, String>,
    pub phases: Vec<PhaseDefinition>,
    pub plan: PhasePlan,
    pub retry: RetryConfig,
    pub intents: IntentConfig,
    pub history_limit: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE_NAME.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS
                .iter()
                .map(|name| (name.to_string(), default_worker_url(name)))
                .collect(),
            phases: PhaseRegistry::kingmode().definitions().to_vec(),
            plan: PhasePlan::kingmode(),
            retry: RetryConfig::default(),
            intents: IntentConfig::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl HubConfig {
    /// Defaults, then the optional JSON file, then the process environment.
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::read(path).await?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        info!(
            service = %config.service,
            environment = %config.environment,
            workers = config.workers.len(),
            phases = config.phases.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    pub async fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Config file parsed");
        Ok(config)
    }

    /// Apply `ENVIRONMENT`, `PORT` and `II_<NAME>_URL` overrides read through
    /// `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(environment) = lookup("ENVIRONMENT").filter(|v| !v.is_empty()) {
            self.environment = environment;
        }

        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "PORT".to_string(),
                value: port.clone(),
            })?;
        }

        for (name, url) in self.workers.iter_mut() {
            let key = worker_env_key(name);
            if let Some(value) = lookup(&key).filter(|v| !v.is_empty()) {
                debug!(worker = %name, key = %key, "Worker URL overridden from environment");
                *url = value;
            }
        }
        Ok(())
    }

    /// Reject tables that would only fail later, at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for phase in &self.phases {
            if phase.max_duration.is_zero() {
                return Err(ConfigError::InvalidPhase {
                    phase: phase.name.clone(),
                    reason: "maxDurationMs must be positive".to_string(),
                });
            }
            if phase.worker_names.is_empty() {
                return Err(ConfigError::InvalidPhase {
                    phase: phase.name.clone(),
                    reason: "workerNames must not be empty".to_string(),
                });
            }
            if let Some(worker) = phase
                .worker_names
                .iter()
                .find(|w| !self.workers.contains_key(*w))
            {
                return Err(ConfigError::UnknownWorker {
                    phase: phase.name.clone(),
                    worker: worker.clone(),
                });
            }
        }

        if let Some(missing) = self
            .plan
            .iter()
            .find(|name| !self.phases.iter().any(|p| p.name == *name))
        {
            return Err(ConfigError::UnknownPhase(missing.to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(repeated) = self.plan.iter().find(|name| !seen.insert(*name)) {
            return Err(ConfigError::RepeatedPhase(repeated.to_string()));
        }

        let intents = &self.intents;
        let routed = intents
            .routes
            .iter()
            .map(|(intent, worker)| (intent.as_str(), worker.as_str()))
            .chain([
                ("<classifier>", intents.classifier.as_str()),
                ("<fallback>", intents.fallback.as_str()),
            ]);
        for (intent, worker) in routed {
            if !self.workers.contains_key(worker) {
                return Err(ConfigError::UnknownIntentWorker {
                    intent: intent.to_string(),
                    worker: worker.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn agent_registry(&self) -> AgentRegistry {
        self.workers
            .iter()
            .map(|(name, url)| (name.as_str(), url.as_str()))
            .collect()
    }

    pub fn phase_registry(&self) -> PhaseRegistry {
        self.phases
            .iter()
            .cloned()
            .fold(PhaseRegistry::new(), PhaseRegistry::with_phase)
    }

    pub fn intent_table(&self) -> IntentTable {
        self.intents
            .routes
            .iter()
            .fold(IntentTable::new(&self.intents.fallback), |table, (intent, worker)| {
                table.with_route(intent, worker)
            })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            phase_options: self.retry.mutating_options(),
            direct_options: self.retry.mutating_options(),
            classify_options: self.retry.read_options(),
            history_limit: self.history_limit,
        }
    }
}

/// `codegen` → `II_CODEGEN_URL`.
pub fn worker_env_key(worker: &str) -> String {
    format!("II_{}_URL", worker.to_uppercase().replace('-', "_"))
}
