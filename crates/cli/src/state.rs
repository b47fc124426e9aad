//! Component wiring from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use linkscout_core::{
    build_downloaders, build_registry, Config, EventReceiver, ExperienceStore, FetchEscalator,
    IdentityBuilder, Orchestrator, StrategyScorer,
};

/// Everything a command needs, built once from the configuration.
pub struct AppState {
    pub config: Config,
    pub identities: Arc<IdentityBuilder>,
    pub escalator: Arc<FetchEscalator>,
    pub scorer: Arc<StrategyScorer>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let identities = Arc::new(
            IdentityBuilder::from_config(&config.identity)
                .context("Failed to create identity builder")?,
        );
        let escalator = Arc::new(
            FetchEscalator::from_config(&config.fetch, &config.robots, identities.clone())
                .context("Failed to create fetch escalator")?,
        );
        let experience = Arc::new(ExperienceStore::load(&config.experience.path));
        let scorer = Arc::new(StrategyScorer::new(config.scoring.clone(), experience));

        Ok(Self {
            config,
            identities,
            escalator,
            scorer,
        })
    }

    /// Orchestrator with every engine and downloader registered.
    pub fn orchestrator(&self) -> (Orchestrator, EventReceiver) {
        let kill_grace = self.config.orchestrator.kill_grace();
        let registry = build_registry(&self.config.engines, self.escalator.clone(), kill_grace);
        info!("Registered strategies: {:?}", registry.kinds());
        let downloaders = build_downloaders(
            &self.config.download,
            &self.config.engines,
            self.identities.clone(),
            kill_grace,
        );
        Orchestrator::new(
            self.config.orchestrator.clone(),
            self.scorer.clone(),
            Arc::new(registry),
            self.identities.clone(),
            downloaders,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkscout_core::{load_config_from_str, OrchestratorState};

    #[tokio::test]
    async fn test_wires_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.experience.path = dir.path().join("experience.json");

        let state = AppState::new(config).unwrap();
        assert!(!state.escalator.engine_names().is_empty());
        let (orchestrator, _rx) = state.orchestrator();
        assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    }

    #[test]
    fn test_unknown_engine_in_order_fails() {
        let config = load_config_from_str(
            r#"
            [fetch]
            engine_order = ["reqwest", "missing"]
            "#,
        )
        .unwrap();
        assert!(AppState::new(config).is_err());
    }
}
