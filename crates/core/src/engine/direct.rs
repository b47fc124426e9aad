//! HEAD probe for URLs that already point at a file.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::error::EngineError;
use super::traits::ResolveEngine;
use super::types::{Resolution, ResourceItem};
use crate::download::{filename_from_content_disposition, filename_from_url};
use crate::fetch::{FetchEscalator, FetchRequest};
use crate::identity::Identity;
use crate::lifecycle::CancelHandle;
use crate::strategy::StrategyKind;

/// Resolves a URL to itself when a HEAD request says it is not a web page.
pub struct DirectLinkEngine {
    escalator: Arc<FetchEscalator>,
}

impl DirectLinkEngine {
    pub fn new(escalator: Arc<FetchEscalator>) -> Self {
        Self { escalator }
    }
}

#[async_trait]
impl ResolveEngine for DirectLinkEngine {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectLinkCheck
    }

    async fn attempt(
        &self,
        url: &str,
        _identity: &Identity,
        cancel: &CancelHandle,
    ) -> Result<Resolution, EngineError> {
        // the escalator builds its own identity per attempt
        let request = FetchRequest::head(url);
        let response = self.escalator.fetch(&request, cancel).await?;

        if !response.is_success() {
            debug!("HEAD {} returned {}", url, response.status);
            return Err(EngineError::NoResources);
        }

        let mime = response
            .content_type()
            .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());
        if mime.as_deref().is_some_and(is_page_type) {
            debug!("{} is a web page ({:?})", url, mime);
            return Err(EngineError::NoResources);
        }

        let final_url = if response.final_url.is_empty() {
            url.to_string()
        } else {
            response.final_url.clone()
        };
        let filename = response
            .header("content-disposition")
            .and_then(filename_from_content_disposition)
            .or_else(|| filename_from_url(&final_url));

        let item = ResourceItem::direct(final_url, filename.clone())
            .with_size(response.content_length())
            .with_mime(mime);
        Ok(Resolution::new(filename, vec![item]))
    }
}

fn is_page_type(mime: &str) -> bool {
    mime.starts_with("text/html") || mime == "application/xhtml+xml"
}
