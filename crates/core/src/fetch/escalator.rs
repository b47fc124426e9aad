//! Multi-engine fetch with per-engine retries, block detection and robots gate.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use super::block::{is_captcha, is_edge_block, is_proxy_rejection};
use super::client::HttpEngine;
use super::config::{FetchConfig, HttpEngineConfig, HttpEngineKind};
use super::curl_engine::CurlImpersonateEngine;
use super::reqwest_engine::ReqwestEngine;
use super::retry::RetryPolicy;
use super::robots::{origin_of, RobotsCache, RobotsRules};
use super::types::{FetchError, FetchRequest, FetchResponse};
use crate::config::RobotsConfig;
use crate::identity::IdentityBuilder;
use crate::lifecycle::CancelHandle;
use crate::metrics;

/// Tries engines in order until one returns a usable response.
pub struct FetchEscalator {
    engines: Vec<Arc<dyn HttpEngine>>,
    identities: Arc<IdentityBuilder>,
    retry: RetryPolicy,
    robots: RobotsConfig,
    robots_cache: RobotsCache,
}

enum AttemptOutcome {
    Done(FetchResponse),
    Retry(String),
    NextEngine(String),
}

impl FetchEscalator {
    /// Engines are tried in the order given.
    pub fn new(
        engines: Vec<Arc<dyn HttpEngine>>,
        identities: Arc<IdentityBuilder>,
        retry: RetryPolicy,
        robots: RobotsConfig,
    ) -> Self {
        Self {
            engines,
            identities,
            retry,
            robots,
            robots_cache: RobotsCache::new(),
        }
    }

    /// Build the configured engines in `engine_order`.
    pub fn from_config(
        fetch: &FetchConfig,
        robots: &RobotsConfig,
        identities: Arc<IdentityBuilder>,
    ) -> Result<Self, FetchError> {
        let mut engines: Vec<Arc<dyn HttpEngine>> = Vec::new();
        for name in &fetch.engine_order {
            let engine_config = fetch
                .engines
                .iter()
                .find(|e| &e.name == name)
                .ok_or_else(|| FetchError::Configuration(format!("unknown engine '{}'", name)))?;
            engines.push(create_engine(engine_config, fetch));
        }
        if engines.is_empty() {
            return Err(FetchError::NoEngines);
        }
        info!(
            "Fetch escalation order: {}",
            fetch.engine_order.join(" -> ")
        );
        Ok(Self::new(
            engines,
            identities,
            RetryPolicy::from_config(fetch),
            robots.clone(),
        ))
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.name().to_string()).collect()
    }

    pub fn identities(&self) -> &Arc<IdentityBuilder> {
        &self.identities
    }

    /// Fetch `request.url`, escalating through engines.
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancelHandle,
    ) -> Result<FetchResponse, FetchError> {
        if self.engines.is_empty() {
            return Err(FetchError::NoEngines);
        }
        let url = request.full_url()?;
        let host = url.host_str().unwrap_or_default().to_string();

        let start = request
            .start_engine
            .as_deref()
            .and_then(|name| self.engines.iter().position(|e| e.name() == name))
            .unwrap_or(0);
        let engines = &self.engines[start..];

        if self.robots.enabled && !request.ignore_robots {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if !self.robots_allowed(&url, engines[0].as_ref(), cancel).await? {
                warn!("Skipping {}: disallowed by robots.txt", url);
                return Err(FetchError::RobotsDisallowed {
                    url: url.to_string(),
                });
            }
        }

        let mut last_error = String::from("no attempt made");
        let mut tried = Vec::new();

        for engine in engines {
            tried.push(engine.name().to_string());
            if engine.capabilities().scoped_cookies && !host.is_empty() {
                engine.clear_domain_cookies(&host);
            }

            for attempt in 0..self.retry.max_retries_per_engine {
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }

                let identity = self
                    .identities
                    .build(request.previous_url.as_deref(), Some(request.headers.as_slice()));
                debug!(
                    engine = engine.name(),
                    attempt = attempt + 1,
                    "Fetching {} ({})",
                    url,
                    identity.describe()
                );

                let result = tokio::select! {
                    result = engine.execute(request, &identity) => result,
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                };

                let outcome = match result {
                    Ok(response) => {
                        if is_captcha(&response.body) {
                            warn!(engine = engine.name(), "CAPTCHA detected at {}", url);
                            metrics::record_fetch_attempt(engine.name(), "captcha");
                            return Err(FetchError::CaptchaDetected {
                                engine: engine.name().to_string(),
                                url: url.to_string(),
                            });
                        }
                        if response.is_success() {
                            AttemptOutcome::Done(response)
                        } else {
                            let message = format!("HTTP {} from {}", response.status, engine.name());
                            warn!(engine = engine.name(), status = response.status, "HTTP error for {}", url);
                            if is_edge_block(&response) && !engine.capabilities().bypasses_edge_block {
                                AttemptOutcome::NextEngine(message)
                            } else {
                                if is_proxy_rejection(response.status) {
                                    if let Some(proxy) = &identity.proxy {
                                        self.identities.proxies().mark_bad(proxy);
                                    }
                                }
                                AttemptOutcome::Retry(message)
                            }
                        }
                    }
                    Err(e) => {
                        warn!(engine = engine.name(), "Attempt {} failed: {}", attempt + 1, e);
                        AttemptOutcome::Retry(format!("{}: {}", engine.name(), e))
                    }
                };

                match outcome {
                    AttemptOutcome::Done(response) => {
                        info!(engine = engine.name(), status = response.status, "Fetched {}", url);
                        metrics::record_fetch_attempt(engine.name(), "success");
                        engine.persist_cookies();
                        return Ok(response);
                    }
                    AttemptOutcome::NextEngine(message) => {
                        info!(engine = engine.name(), "Edge-network block, escalating");
                        metrics::record_fetch_attempt(engine.name(), "edge_block");
                        last_error = message;
                        break;
                    }
                    AttemptOutcome::Retry(message) => {
                        metrics::record_fetch_attempt(engine.name(), "failure");
                        last_error = message;
                    }
                }

                if attempt + 1 < self.retry.max_retries_per_engine {
                    let delay = self.retry.backoff_delay(attempt);
                    debug!("Backing off {:?}", delay);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    }
                }
            }
        }

        warn!("All engines failed for {}: {}", url, last_error);
        Err(FetchError::Exhausted {
            engines: tried,
            last_error,
        })
    }

    /// A cancelled robots fetch leaves the origin uncached.
    async fn robots_allowed(
        &self,
        url: &Url,
        engine: &dyn HttpEngine,
        cancel: &CancelHandle,
    ) -> Result<bool, FetchError> {
        let origin = origin_of(url);
        let rules = match self.robots_cache.get(&origin) {
            Some(rules) => rules,
            None => {
                let rules = self.fetch_robots(&origin, engine, cancel).await?;
                self.robots_cache.insert(origin, rules)
            }
        };
        Ok(rules.is_url_allowed(&self.robots.user_agent, url))
    }

    async fn fetch_robots(
        &self,
        origin: &str,
        engine: &dyn HttpEngine,
        cancel: &CancelHandle,
    ) -> Result<RobotsRules, FetchError> {
        let robots_url = format!("{}/robots.txt", origin);
        let request = FetchRequest::get(&robots_url)
            .timeout(Duration::from_secs(self.robots.timeout_secs));
        let identity = self.identities.build(None, None);

        let result = tokio::select! {
            result = engine.execute(&request, &identity) => result,
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        };

        let rules = match result {
            Ok(response) if response.is_success() => {
                debug!("Parsed robots.txt for {}", origin);
                RobotsRules::parse(&response.body)
            }
            Ok(response) => {
                warn!("robots.txt for {} returned HTTP {}, allowing all", origin, response.status);
                RobotsRules::allow_all()
            }
            Err(e) => {
                warn!("Could not fetch robots.txt for {} ({}), allowing all", origin, e);
                RobotsRules::allow_all()
            }
        };
        Ok(rules)
    }
}

/// Build one engine from its configuration.
pub fn create_engine(config: &HttpEngineConfig, fetch: &FetchConfig) -> Arc<dyn HttpEngine> {
    let timeout = Duration::from_secs(fetch.request_timeout_secs);
    let cookie_dir: Option<&Path> = fetch.cookie_dir.as_deref();

    match config.kind {
        HttpEngineKind::Reqwest => {
            let engine = match cookie_dir {
                Some(dir) => ReqwestEngine::with_cookie_dir(&config.name, dir, timeout),
                None => ReqwestEngine::new(&config.name, timeout),
            };
            let mut caps = engine.capabilities();
            apply_overrides(&mut caps, config);
            Arc::new(engine.with_capabilities(caps))
        }
        HttpEngineKind::CurlImpersonate => {
            let mut engine = CurlImpersonateEngine::new(&config.name, config.binary_dir.clone(), timeout);
            if let Some(dir) = cookie_dir {
                engine = engine.with_cookie_dir(dir);
            }
            let mut caps = engine.capabilities();
            apply_overrides(&mut caps, config);
            Arc::new(engine.with_capabilities(caps))
        }
    }
}

fn apply_overrides(caps: &mut super::client::EngineCapabilities, config: &HttpEngineConfig) {
    if let Some(scoped) = config.scoped_cookies {
        caps.scoped_cookies = scoped;
    }
    if let Some(bypass) = config.bypasses_edge_block {
        caps.bypasses_edge_block = bypass;
    }
}
