//! HTTP engine trait.

use async_trait::async_trait;

use super::types::{AttemptError, FetchRequest, FetchResponse};
use crate::identity::Identity;

/// What the escalator needs to know about an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineCapabilities {
    /// Cookies for the target domain are cleared before the engine is used.
    pub scoped_cookies: bool,
    /// The engine gets past edge-network blocks, so retrying on it is useful.
    pub bypasses_edge_block: bool,
}

/// One HTTP client implementation the escalator can fall back to.
#[async_trait]
pub trait HttpEngine: Send + Sync {
    /// Unique name (used in the escalation order and for cookie files).
    fn name(&self) -> &str;

    fn capabilities(&self) -> EngineCapabilities;

    /// Forget cookies that would be sent to `host`.
    fn clear_domain_cookies(&self, host: &str);

    /// Perform one attempt with the given identity.
    ///
    /// Any HTTP status is `Ok`; only transport problems are errors.
    async fn execute(
        &self,
        request: &FetchRequest,
        identity: &Identity,
    ) -> Result<FetchResponse, AttemptError>;

    /// Write the engine's cookies to its cookie file, if it has one.
    fn persist_cookies(&self);
}
