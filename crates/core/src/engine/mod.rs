//! Resolve engines: one back-end per detection strategy.
//!
//! Each engine implements [`ResolveEngine`] and turns a URL into a
//! [`Resolution`] (title plus downloadable [`ResourceItem`]s). HTTP-based
//! engines go through the shared [`FetchEscalator`](crate::fetch::FetchEscalator);
//! process-based engines run their tool under the task's
//! [`CancelHandle`](crate::lifecycle::CancelHandle).
//!
//! # Example
//!
//! ```ignore
//! use linkscout_core::engine::build_registry;
//!
//! let registry = build_registry(&config.engines, escalator, kill_grace);
//! let engine = registry.get(StrategyKind::HtmlParse)?;
//! let resolution = engine.attempt(url, &identity, &cancel).await?;
//! ```

mod browser;
mod config;
mod direct;
mod error;
mod html;
mod links;
mod media;
mod release;
mod traits;
mod types;

use std::sync::Arc;
use std::time::Duration;

pub use browser::BrowserRenderEngine;
pub use config::EngineConfig;
pub use direct::DirectLinkEngine;
pub use error::EngineError;
pub use html::HtmlParseEngine;
pub use links::{extract_links, extract_title};
pub use media::{parse_media_info, MediaExtractEngine, BEST_FORMAT};
pub use release::{ReleaseApiEngine, ReleaseRef, ReleaseTarget};
pub use traits::ResolveEngine;
pub use types::{extension_of, ItemKind, Resolution, ResourceCategory, ResourceItem};

use crate::fetch::FetchEscalator;
use crate::strategy::EngineRegistry;

/// Register one engine per strategy.
pub fn build_registry(
    config: &EngineConfig,
    escalator: Arc<FetchEscalator>,
    kill_grace: Duration,
) -> EngineRegistry {
    let mut registry = EngineRegistry::new();
    registry.register(Arc::new(DirectLinkEngine::new(escalator.clone())));
    registry.register(Arc::new(ReleaseApiEngine::from_env(
        escalator.clone(),
        config.github_api_url.clone(),
        &config.github_token_env,
    )));
    registry.register(Arc::new(HtmlParseEngine::new(escalator)));
    registry.register(Arc::new(MediaExtractEngine::new(
        config.yt_dlp_path.clone(),
        Duration::from_secs(config.media_probe_timeout_secs),
        kill_grace,
    )));
    registry.register(Arc::new(BrowserRenderEngine::new(
        config.browser_path.clone(),
        Duration::from_secs(config.browser_wait_secs),
        Duration::from_secs(config.browser_timeout_secs),
        kill_grace,
    )));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotsConfig;
    use crate::fetch::RetryPolicy;
    use crate::identity::IdentityBuilder;
    use crate::strategy::StrategyKind;

    #[test]
    fn test_build_registry_covers_every_strategy() {
        let escalator = Arc::new(FetchEscalator::new(
            Vec::new(),
            Arc::new(IdentityBuilder::with_defaults()),
            RetryPolicy::immediate(1),
            RobotsConfig::default(),
        ));
        let registry = build_registry(&EngineConfig::default(), escalator, Duration::from_secs(1));
        for kind in StrategyKind::SCORING_ORDER {
            assert_eq!(registry.get(kind).unwrap().kind(), kind);
        }
    }
}
