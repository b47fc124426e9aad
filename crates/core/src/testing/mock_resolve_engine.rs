//! Mock resolve engine for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::mock_stoppable::MockStoppable;
use crate::engine::{EngineError, Resolution, ResolveEngine};
use crate::identity::Identity;
use crate::lifecycle::CancelHandle;
use crate::strategy::StrategyKind;

/// A recorded attempt for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub url: String,
    pub user_agent: String,
}

/// Mock implementation of the ResolveEngine trait.
///
/// Provides controllable behavior for testing:
/// - Queue results (`push_result`) or errors (`set_next_error`)
/// - Fall back to a default resolution, or `NoResources` when none is set
/// - Simulate slow attempts and a registered external resource
///
/// # Example
///
/// ```rust,ignore
/// let engine = MockResolveEngine::new(StrategyKind::HtmlParse);
/// engine.set_default_resolution(fixtures::resolution("Page", 2)).await;
/// engine.set_next_error(EngineError::NoResources).await;
///
/// registry.register(Arc::new(engine));
/// ```
#[derive(Debug)]
pub struct MockResolveEngine {
    kind: StrategyKind,
    attempts: Arc<RwLock<Vec<RecordedAttempt>>>,
    outcomes: Arc<RwLock<VecDeque<Result<Resolution, EngineError>>>>,
    default_resolution: Arc<RwLock<Option<Resolution>>>,
    delay: Arc<RwLock<Duration>>,
    resource: Arc<RwLock<Option<Arc<MockStoppable>>>>,
}

impl MockResolveEngine {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            attempts: Arc::new(RwLock::new(Vec::new())),
            outcomes: Arc::new(RwLock::new(VecDeque::new())),
            default_resolution: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            resource: Arc::new(RwLock::new(None)),
        }
    }

    /// Engine that always succeeds with `resolution`.
    pub fn succeeding(kind: StrategyKind, resolution: Resolution) -> Self {
        let mut engine = Self::new(kind);
        engine.default_resolution = Arc::new(RwLock::new(Some(resolution)));
        engine
    }

    /// Engine that always fails with `NoResources`.
    pub fn failing(kind: StrategyKind) -> Self {
        Self::new(kind)
    }

    pub async fn push_result(&self, resolution: Resolution) {
        self.outcomes.write().await.push_back(Ok(resolution));
    }

    /// Configure the next attempt to fail with the given error.
    pub async fn set_next_error(&self, error: EngineError) {
        self.outcomes.write().await.push_back(Err(error));
    }

    pub async fn set_default_resolution(&self, resolution: Resolution) {
        *self.default_resolution.write().await = Some(resolution);
    }

    /// Make every attempt take at least `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Register `resource` with the cancel handle while an attempt runs.
    pub async fn set_resource(&self, resource: Arc<MockStoppable>) {
        *self.resource.write().await = Some(resource);
    }

    pub async fn recorded_attempts(&self) -> Vec<RecordedAttempt> {
        self.attempts.read().await.clone()
    }

    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }
}

#[async_trait]
impl ResolveEngine for MockResolveEngine {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn attempt(
        &self,
        url: &str,
        identity: &Identity,
        cancel: &CancelHandle,
    ) -> Result<Resolution, EngineError> {
        self.attempts.write().await.push(RecordedAttempt {
            url: url.to_string(),
            user_agent: identity.user_agent.clone(),
        });

        let resource = self.resource.read().await.clone();
        let _guard = resource.map(|r| cancel.register(r));

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            }
        }

        if let Some(outcome) = self.outcomes.write().await.pop_front() {
            return outcome;
        }
        match self.default_resolution.read().await.clone() {
            Some(resolution) => Ok(resolution),
            None => Err(EngineError::NoResources),
        }
    }
}
