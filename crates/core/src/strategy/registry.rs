//! Strategy to engine lookup, populated once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::types::StrategyKind;
use crate::engine::ResolveEngine;

/// A strategy was selected but no engine implements it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no engine registered for strategy '{0}'")]
pub struct UnknownStrategy(pub StrategyKind);

/// Maps each strategy to the engine that runs it.
#[derive(Default, Clone)]
pub struct EngineRegistry {
    engines: HashMap<StrategyKind, Arc<dyn ResolveEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `engine` under its own kind, replacing any previous one.
    pub fn register(&mut self, engine: Arc<dyn ResolveEngine>) {
        self.engines.insert(engine.kind(), engine);
    }

    pub fn with(mut self, engine: Arc<dyn ResolveEngine>) -> Self {
        self.register(engine);
        self
    }

    pub fn get(&self, kind: StrategyKind) -> Result<Arc<dyn ResolveEngine>, UnknownStrategy> {
        self.engines.get(&kind).cloned().ok_or(UnknownStrategy(kind))
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Registered kinds in a stable order.
    pub fn kinds(&self) -> Vec<StrategyKind> {
        let mut kinds: Vec<_> = self.engines.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockResolveEngine;

    #[test]
    fn test_register_and_lookup() {
        let registry = EngineRegistry::new()
            .with(Arc::new(MockResolveEngine::new(StrategyKind::HtmlParse)))
            .with(Arc::new(MockResolveEngine::new(StrategyKind::DirectLinkCheck)));

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.kinds(),
            vec![StrategyKind::DirectLinkCheck, StrategyKind::HtmlParse]
        );
        assert_eq!(registry.get(StrategyKind::HtmlParse).unwrap().kind(), StrategyKind::HtmlParse);
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = EngineRegistry::new();
        assert!(registry.is_empty());
        let Err(err) = registry.get(StrategyKind::BrowserRender) else {
            panic!("expected an unknown strategy error");
        };
        assert_eq!(err, UnknownStrategy(StrategyKind::BrowserRender));
        assert_eq!(err.to_string(), "no engine registered for strategy 'browser_render'");
    }
}
