//! Static lookup tables for worker addresses and phase definitions.
//!
//! Both registries are built once at startup and shared behind `Arc`; nothing
//! mutates them afterwards, so concurrent sessions read them without locks.

use std::collections::BTreeMap;
use std::time::Duration;

use hub_core::{PhaseDefinition, AGENT, BRAINSTORM, FORMING};

use crate::error::{OrchestratorError, Result};

/// Every worker the hub knows about out of the box.
pub const DEFAULT_WORKERS: [&str; 19] = [
    "nlu",
    "codegen",
    "research",
    "validation",
    "security",
    "reasoning",
    "multimodal",
    "streaming",
    "kg",
    "deploy",
    "observability",
    "costopt",
    "legal",
    "synthesis",
    "hitl",
    "prompt",
    "tools",
    "learning",
    "data",
];

/// In-cluster address used when no URL is configured for a default worker.
pub fn default_worker_url(name: &str) -> String {
    format!("http://ii-{}-worker:8080", name)
}

/// Logical worker name → base URL.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    workers: BTreeMap<String, String>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All [`DEFAULT_WORKERS`] at their in-cluster addresses.
    pub fn with_default_hosts() -> Self {
        DEFAULT_WORKERS
            .iter()
            .map(|name| (name.to_string(), default_worker_url(name)))
            .collect()
    }

    pub fn with_worker(mut self, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.insert(name, base_url);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, base_url: impl Into<String>) {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        self.workers.insert(name.into(), base_url);
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.workers.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.workers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AgentRegistry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (name, url) in iter {
            registry.insert(name, url);
        }
        registry
    }
}

/// Phase name → definition, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct PhaseRegistry {
    phases: Vec<PhaseDefinition>,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// BRAINSTORM, FORMING and AGENT with their standard worker sets.
    pub fn kingmode() -> Self {
        Self::new()
            .with_phase(
                PhaseDefinition::new(
                    BRAINSTORM,
                    ["nlu", "research", "reasoning"],
                    Duration::from_secs(30),
                )
                .with_description("Idea generation and context gathering"),
            )
            .with_phase(
                PhaseDefinition::new(
                    FORMING,
                    ["codegen", "validation", "security"],
                    Duration::from_secs(60),
                )
                .with_description("Solution development and validation"),
            )
            .with_phase(
                PhaseDefinition::new(
                    AGENT,
                    ["synthesis", "deploy", "learning"],
                    Duration::from_secs(120),
                )
                .with_description("Execution and delivery"),
            )
    }

    /// Later registrations replace earlier ones with the same name.
    pub fn with_phase(mut self, phase: PhaseDefinition) -> Self {
        self.insert(phase);
        self
    }

    pub fn insert(&mut self, phase: PhaseDefinition) {
        match self.phases.iter_mut().find(|p| p.name == phase.name) {
            Some(existing) => *existing = phase,
            None => self.phases.push(phase),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.name == name)
    }

    pub fn definitions(&self) -> &[PhaseDefinition] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Every worker named by a phase must have an address.
    pub fn validate(&self, agents: &AgentRegistry) -> Result<()> {
        for phase in &self.phases {
            if let Some(missing) = phase.worker_names.iter().find(|w| !agents.contains(w)) {
                return Err(OrchestratorError::UnknownWorker(missing.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hosts() {
        let agents = AgentRegistry::with_default_hosts();
        assert_eq!(agents.len(), 19);
        assert_eq!(agents.resolve("kg"), Some("http://ii-kg-worker:8080"));
        assert!(agents.resolve("ghost").is_none());
    }

    #[test]
    fn test_insert_trims_trailing_slash() {
        let agents = AgentRegistry::new().with_worker("codegen", "http://localhost:9000/");
        assert_eq!(agents.resolve("codegen"), Some("http://localhost:9000"));
    }

    #[test]
    fn test_names_are_sorted() {
        let agents: AgentRegistry = [("research", "http://r"), ("codegen", "http://c")]
            .into_iter()
            .collect();
        let names: Vec<&str> = agents.names().collect();
        assert_eq!(names, vec!["codegen", "research"]);
    }

    #[test]
    fn test_kingmode_phases() {
        let phases = PhaseRegistry::kingmode();
        assert_eq!(phases.len(), 3);

        let forming = phases.resolve(FORMING).unwrap();
        assert_eq!(forming.worker_names, vec!["codegen", "validation", "security"]);
        assert_eq!(forming.max_duration, Duration::from_secs(60));
        assert!(phases.resolve("DEPLOY").is_none());
    }

    #[test]
    fn test_with_phase_replaces_existing() {
        let phases = PhaseRegistry::kingmode().with_phase(PhaseDefinition::new(
            AGENT,
            ["deploy"],
            Duration::from_millis(500),
        ));

        assert_eq!(phases.len(), 3);
        assert_eq!(phases.resolve(AGENT).unwrap().worker_names, vec!["deploy"]);
        assert_eq!(phases.definitions()[2].name, AGENT);
    }

    #[test]
    fn test_validate_reports_missing_worker() {
        let phases = PhaseRegistry::kingmode();
        assert!(phases.validate(&AgentRegistry::with_default_hosts()).is_ok());

        let partial = AgentRegistry::new().with_worker("nlu", "http://nlu");
        let err = phases.validate(&partial).unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownWorker(ref w) if w == "research"));
    }
}
