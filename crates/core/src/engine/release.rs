//! GitHub release assets through the REST API.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use super::error::EngineError;
use super::traits::ResolveEngine;
use super::types::{Resolution, ResourceItem};
use crate::fetch::{FetchEscalator, FetchRequest};
use crate::identity::Identity;
use crate::lifecycle::CancelHandle;
use crate::strategy::StrategyKind;

static RELEASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com/([^/]+)/([^/]+)/releases(?:/(tag/([^/?#]+)|latest))?/?(?:[?#]|$)")
        .unwrap()
});

/// Which release a URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseRef {
    Tag(String),
    Latest,
}

/// Owner, repository and release parsed from a GitHub release URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    pub owner: String,
    pub repo: String,
    pub release: ReleaseRef,
}

impl ReleaseTarget {
    /// `github.com/{owner}/{repo}/releases/tag/{tag}`, `/releases/latest` or
    /// bare `/releases` (treated as latest).
    pub fn parse(url: &str) -> Option<Self> {
        let caps = RELEASE_RE.captures(url)?;
        let owner = caps.get(1)?.as_str().to_string();
        let repo = caps.get(2)?.as_str().to_string();
        let release = match caps.get(4) {
            Some(tag) => ReleaseRef::Tag(
                urlencoding::decode(tag.as_str())
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| tag.as_str().to_string()),
            ),
            None => ReleaseRef::Latest,
        };
        Some(Self { owner, repo, release })
    }

    pub fn api_url(&self, api_base: &str) -> String {
        let base = api_base.trim_end_matches('/');
        match &self.release {
            ReleaseRef::Tag(tag) => format!(
                "{}/repos/{}/{}/releases/tags/{}",
                base,
                self.owner,
                self.repo,
                urlencoding::encode(tag)
            ),
            ReleaseRef::Latest => {
                format!("{}/repos/{}/{}/releases/latest", base, self.owner, self.repo)
            }
        }
    }

    fn fallback_title(&self) -> String {
        match &self.release {
            ReleaseRef::Tag(tag) => format!("{}/{} - {}", self.owner, self.repo, tag),
            ReleaseRef::Latest => format!("{}/{} - latest", self.owner, self.repo),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
    name: String,
    browser_download_url: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    content_type: Option<String>,
}

/// Lists the assets of a GitHub release.
pub struct ReleaseApiEngine {
    escalator: Arc<FetchEscalator>,
    api_base: String,
    token: Option<String>,
}

impl ReleaseApiEngine {
    pub fn new(escalator: Arc<FetchEscalator>, api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            escalator,
            api_base: api_base.into(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Token read from the environment variable `var`, if set.
    pub fn from_env(escalator: Arc<FetchEscalator>, api_base: impl Into<String>, var: &str) -> Self {
        Self::new(escalator, api_base, std::env::var(var).ok())
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl ResolveEngine for ReleaseApiEngine {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ReleaseApi
    }

    async fn attempt(
        &self,
        url: &str,
        _identity: &Identity,
        cancel: &CancelHandle,
    ) -> Result<Resolution, EngineError> {
        let target = ReleaseTarget::parse(url).ok_or_else(|| EngineError::InvalidUrl(url.to_string()))?;
        let api_url = target.api_url(&self.api_base);
        debug!("Querying release API {}", api_url);

        let mut request = FetchRequest::get(&api_url)
            .header("Accept", "application/vnd.github.v3+json")
            .ignore_robots(true);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("token {}", token));
        }

        let response = self.escalator.fetch(&request, cancel).await?;
        let release: ApiRelease = response
            .json()
            .map_err(|e| EngineError::parse("release API response", e.to_string()))?;
        let resolution = release_to_resolution(&target, release);
        if resolution.is_empty() {
            return Err(EngineError::NoResources);
        }
        info!(
            "Release {}/{} has {} assets",
            target.owner,
            target.repo,
            resolution.items.len()
        );
        Ok(resolution)
    }
}

fn release_to_resolution(target: &ReleaseTarget, release: ApiRelease) -> Resolution {
    let title = release
        .name
        .filter(|n| !n.trim().is_empty())
        .or_else(|| {
            release
                .tag_name
                .map(|tag| format!("{}/{} - {}", target.owner, target.repo, tag))
        })
        .unwrap_or_else(|| target.fallback_title());

    let items = release
        .assets
        .into_iter()
        .map(|asset| {
            ResourceItem::direct(asset.browser_download_url, Some(asset.name))
                .with_size(asset.size)
                .with_mime(asset.content_type)
        })
        .collect();
    Resolution::new(Some(title), items)
}
