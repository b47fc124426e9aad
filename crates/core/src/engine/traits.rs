//! Trait definitions for the resolve engines.

use async_trait::async_trait;

use super::error::EngineError;
use super::types::Resolution;
use crate::identity::Identity;
use crate::lifecycle::CancelHandle;
use crate::strategy::StrategyKind;

/// Back-end for one detection strategy.
#[async_trait]
pub trait ResolveEngine: Send + Sync {
    /// The strategy this engine implements.
    fn kind(&self) -> StrategyKind;

    /// Try to find downloadable resources behind `url`.
    ///
    /// External processes or sessions started here must be registered with
    /// `cancel` so that a stop request tears them down immediately.
    async fn attempt(
        &self,
        url: &str,
        identity: &Identity,
        cancel: &CancelHandle,
    ) -> Result<Resolution, EngineError>;
}
