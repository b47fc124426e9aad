//! Testing utilities and mock implementations.
//!
//! Mocks for every seam the orchestrator and escalator depend on, so that
//! sniff, fetch and download flows can be exercised without network access
//! or external tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use linkscout_core::testing::{fixtures, MockDownloader, MockResolveEngine};
//!
//! let html = MockResolveEngine::succeeding(StrategyKind::HtmlParse, fixtures::resolution("Page", 2));
//! let registry = EngineRegistry::new().with(Arc::new(html));
//! ```

mod mock_downloader;
mod mock_http_engine;
mod mock_resolve_engine;
mod mock_stoppable;

pub use mock_downloader::MockDownloader;
pub use mock_http_engine::{MockHttpEngine, RecordedRequest};
pub use mock_resolve_engine::{MockResolveEngine, RecordedAttempt};
pub use mock_stoppable::MockStoppable;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::sync::Arc;

    use crate::download::DownloadTask;
    use crate::engine::{Resolution, ResourceCategory, ResourceItem};
    use crate::experience::ExperienceStore;
    use crate::fetch::FetchResponse;
    use crate::identity::{Identity, TlsProfile};
    use crate::strategy::{ScoringConfig, StrategyScorer};

    /// A fixed identity without proxy.
    pub fn identity() -> Identity {
        Identity {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0.0.0 Safari/537.36".to_string(),
            proxy: None,
            headers: vec![("Accept".to_string(), "*/*".to_string())],
            tls_profile: TlsProfile::Chrome120,
        }
    }

    /// Response from `engine` with the given status and body.
    pub fn fetch_response(engine: &str, status: u16, body: &str) -> FetchResponse {
        FetchResponse {
            engine: engine.to_string(),
            status,
            final_url: String::new(),
            headers: vec![("content-type".to_string(), "text/html; charset=utf-8".to_string())],
            body: body.to_string(),
        }
    }

    /// A direct item for `https://files.example.com/<name>`.
    pub fn direct_item(name: &str) -> ResourceItem {
        ResourceItem::direct(format!("https://files.example.com/{}", name), Some(name.to_string()))
            .with_size(Some(1024))
    }

    /// A media format item.
    pub fn media_item(url: &str, format_id: &str) -> ResourceItem {
        ResourceItem::media(url, format_id, ResourceCategory::Video)
    }

    /// Resolution with `count` direct archive items.
    pub fn resolution(title: &str, count: usize) -> Resolution {
        let items = (1..=count)
            .map(|i| direct_item(&format!("file-{}.zip", i)))
            .collect();
        Resolution::new(Some(title.to_string()), items)
    }

    /// Download task for `item` into `destination`.
    pub fn download_task(item: ResourceItem, destination: &Path) -> DownloadTask {
        DownloadTask::new("https://example.com/page", item, destination)
    }

    /// Scorer with default scoring over an in-memory experience store.
    pub fn scorer() -> Arc<StrategyScorer> {
        Arc::new(StrategyScorer::new(
            ScoringConfig::default(),
            Arc::new(ExperienceStore::in_memory()),
        ))
    }

    /// Scorer over the given experience store.
    pub fn scorer_with(experience: Arc<ExperienceStore>) -> Arc<StrategyScorer> {
        Arc::new(StrategyScorer::new(ScoringConfig::default(), experience))
    }
}
