//! Static HTML link extraction.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::error::EngineError;
use super::links::{extract_links, extract_title};
use super::traits::ResolveEngine;
use super::types::Resolution;
use crate::fetch::{FetchEscalator, FetchRequest};
use crate::identity::Identity;
use crate::lifecycle::CancelHandle;
use crate::strategy::StrategyKind;

/// Fetches the page through the escalator and scans it for resource links.
pub struct HtmlParseEngine {
    escalator: Arc<FetchEscalator>,
}

impl HtmlParseEngine {
    pub fn new(escalator: Arc<FetchEscalator>) -> Self {
        Self { escalator }
    }
}

#[async_trait]
impl ResolveEngine for HtmlParseEngine {
    fn kind(&self) -> StrategyKind {
        StrategyKind::HtmlParse
    }

    async fn attempt(
        &self,
        url: &str,
        _identity: &Identity,
        cancel: &CancelHandle,
    ) -> Result<Resolution, EngineError> {
        let response = self.escalator.fetch(&FetchRequest::get(url), cancel).await?;
        let base = if response.final_url.is_empty() {
            url
        } else {
            response.final_url.as_str()
        };

        let items = extract_links(base, &response.body);
        debug!("Found {} links on {}", items.len(), base);
        if items.is_empty() {
            return Err(EngineError::NoResources);
        }
        Ok(Resolution::new(extract_title(&response.body), items))
    }
}
