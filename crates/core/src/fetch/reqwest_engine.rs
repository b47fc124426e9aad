//! Plain HTTP engine backed by reqwest.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tracing::{debug, warn};

use super::client::{EngineCapabilities, HttpEngine};
use super::cookies::CookieJar;
use super::types::{AttemptError, FetchRequest, FetchResponse};
use crate::identity::Identity;

/// Headers reqwest manages itself. Sending our own `Accept-Encoding` would
/// disable transparent decompression.
const CLIENT_MANAGED_HEADERS: &[&str] = &["accept-encoding", "connection"];

/// reqwest engine. A new client is built for every attempt so that proxy and
/// identity never leak between attempts; cookies live in a shared jar.
pub struct ReqwestEngine {
    name: String,
    jar: Arc<CookieJar>,
    capabilities: EngineCapabilities,
    default_timeout: Duration,
}

impl ReqwestEngine {
    pub fn new(name: impl Into<String>, default_timeout: Duration) -> Self {
        Self::with_jar(name, Arc::new(CookieJar::new()), default_timeout)
    }

    /// Engine whose cookies persist in `<cookie_dir>/cookies_<name>.json`.
    pub fn with_cookie_dir(name: impl Into<String>, cookie_dir: &Path, default_timeout: Duration) -> Self {
        let name = name.into();
        let jar = CookieJar::load(cookie_dir.join(format!("cookies_{}.json", name)));
        Self::with_jar(name, Arc::new(jar), default_timeout)
    }

    pub fn with_jar(name: impl Into<String>, jar: Arc<CookieJar>, default_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            jar,
            capabilities: EngineCapabilities {
                scoped_cookies: true,
                bypasses_edge_block: false,
            },
            default_timeout,
        }
    }

    pub fn with_capabilities(mut self, capabilities: EngineCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn jar(&self) -> &Arc<CookieJar> {
        &self.jar
    }

    fn client(&self, identity: &Identity, timeout: Duration) -> Result<Client, AttemptError> {
        let mut builder = Client::builder()
            .cookie_provider(Arc::clone(&self.jar))
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(proxy) = &identity.proxy {
            let proxy = Proxy::all(proxy)
                .map_err(|e| AttemptError::Unavailable(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| AttemptError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl HttpEngine for ReqwestEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn clear_domain_cookies(&self, host: &str) {
        self.jar.clear_domain(host);
    }

    async fn execute(
        &self,
        request: &FetchRequest,
        identity: &Identity,
    ) -> Result<FetchResponse, AttemptError> {
        let url = request
            .full_url()
            .map_err(|e| AttemptError::Transport(e.to_string()))?;
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let client = self.client(identity, timeout)?;

        let mut builder = client.request(request.method.clone(), url.clone());
        for (name, value) in &identity.headers {
            if CLIENT_MANAGED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(json) = &request.json {
            builder = builder.json(json);
        } else if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        debug!(engine = %self.name, method = %request.method, %url, "Sending request");

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).to_string()))
            .collect();
        let body = response.text().await.map_err(classify)?;

        Ok(FetchResponse {
            engine: self.name.clone(),
            status,
            final_url,
            headers,
            body,
        })
    }

    fn persist_cookies(&self) {
        if let Err(e) = self.jar.save() {
            warn!(engine = %self.name, "Failed to save cookies: {}", e);
        }
    }
}

fn classify(e: reqwest::Error) -> AttemptError {
    if e.is_timeout() {
        AttemptError::Timeout
    } else {
        AttemptError::Transport(e.to_string())
    }
}
