use std::sync::Arc;

use events::EventBus;
use hub_core::PhasePlan;
use orchestrator::Orchestrator;

use crate::config::HubConfig;

/// Identity reported by `/health`.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub environment: String,
    pub version: String,
}

impl ServiceInfo {
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            name: config.service.clone(),
            environment: config.environment.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub event_bus: EventBus,
    pub service: Arc<ServiceInfo>,
    /// Plan used when a kingmode request does not name its own.
    pub default_plan: PhasePlan,
}

impl AppState {
    /// Build the orchestrator and its registries from `config`.
    pub fn new(config: &HubConfig) -> Self {
        let event_bus = EventBus::new();
        let orchestrator = Orchestrator::new(
            Arc::new(config.agent_registry()),
            Arc::new(config.phase_registry()),
        )
        .with_config(config.engine_config())
        .with_intent_table(config.intent_table())
        .with_classifier(&config.intents.classifier)
        .with_event_bus(event_bus.clone());

        Self::with_orchestrator(orchestrator, event_bus, config)
    }

    /// Wrap an orchestrator built elsewhere. `event_bus` should be the bus the
    /// orchestrator emits on.
    pub fn with_orchestrator(
        orchestrator: Orchestrator,
        event_bus: EventBus,
        config: &HubConfig,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            event_bus,
            service: Arc::new(ServiceInfo::from_config(config)),
            default_plan: config.plan.clone(),
        }
    }
}
