//! Identity builder.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use super::config::IdentityConfig;
use super::headers::consistent_headers;
use super::proxy::ProxyPool;
use super::types::{Identity, IdentityError, TlsProfile};
use super::user_agent::{CatalogUserAgents, UserAgentSource, FALLBACK_USER_AGENTS};

/// Produces a fresh [`Identity`] per fetch attempt.
///
/// The only side effect besides consuming randomness is reading the shared
/// bad-proxy set.
pub struct IdentityBuilder {
    user_agents: Box<dyn UserAgentSource>,
    proxies: Arc<ProxyPool>,
    accept_language: String,
}

impl IdentityBuilder {
    pub fn new(
        user_agents: Box<dyn UserAgentSource>,
        proxies: Arc<ProxyPool>,
        accept_language: impl Into<String>,
    ) -> Self {
        Self {
            user_agents,
            proxies,
            accept_language: accept_language.into(),
        }
    }

    /// Build from configuration, loading the proxy file if one is set.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let proxies = match &config.proxy_file {
            Some(path) => ProxyPool::load(path)?,
            None => ProxyPool::empty(),
        };
        Ok(Self::new(
            Box::new(CatalogUserAgents::from_config(&config.user_agents)),
            Arc::new(proxies),
            config.accept_language.clone(),
        ))
    }

    /// Builder with the built-in catalog and no proxies.
    pub fn with_defaults() -> Self {
        Self::new(
            Box::new(CatalogUserAgents::builtin()),
            Arc::new(ProxyPool::empty()),
            IdentityConfig::default().accept_language,
        )
    }

    /// Shared proxy pool (for marking proxies bad).
    pub fn proxies(&self) -> &Arc<ProxyPool> {
        &self.proxies
    }

    pub fn build(
        &self,
        previous_url: Option<&str>,
        extra_headers: Option<&[(String, String)]>,
    ) -> Identity {
        let mut rng = rand::thread_rng();

        let user_agent = match self.user_agents.generate() {
            Ok(ua) => ua,
            Err(e) => {
                warn!("User agent source failed ({}), using fallback pool", e);
                FALLBACK_USER_AGENTS
                    .choose(&mut rng)
                    .unwrap_or(&FALLBACK_USER_AGENTS[0])
                    .to_string()
            }
        };

        let proxy = self.proxies.pick();
        let headers = consistent_headers(
            &mut rng,
            &user_agent,
            &self.accept_language,
            previous_url,
            extra_headers.unwrap_or(&[]),
        );

        let identity = Identity {
            user_agent,
            proxy,
            headers,
            tls_profile: TlsProfile::pick(&mut rng),
        };
        debug!("New identity: {}", identity.describe());
        identity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenSource;

    impl UserAgentSource for BrokenSource {
        fn generate(&self) -> Result<String, IdentityError> {
            Err(IdentityError::UserAgentUnavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_build_uses_fallback_when_source_fails() {
        let builder = IdentityBuilder::new(
            Box::new(BrokenSource),
            Arc::new(ProxyPool::empty()),
            "en",
        );
        let identity = builder.build(None, None);
        assert!(FALLBACK_USER_AGENTS.contains(&identity.user_agent.as_str()));
        assert_eq!(identity.header("User-Agent"), Some(identity.user_agent.as_str()));
    }

    #[test]
    fn test_build_picks_good_proxy() {
        let pool = Arc::new(ProxyPool::new(vec![
            "http://bad:1".to_string(),
            "http://good:1".to_string(),
        ]));
        pool.mark_bad("http://bad:1");
        let builder = IdentityBuilder::new(
            Box::new(CatalogUserAgents::builtin()),
            Arc::clone(&pool),
            "en",
        );
        for _ in 0..10 {
            assert_eq!(
                builder.build(None, None).proxy.as_deref(),
                Some("http://good:1")
            );
        }
    }

    #[test]
    fn test_build_sets_referer_and_extra_headers() {
        let builder = IdentityBuilder::with_defaults();
        let extra = vec![("Authorization".to_string(), "Bearer t".to_string())];
        let identity = builder.build(Some("https://example.com/"), Some(&extra));
        assert_eq!(identity.header("Referer"), Some("https://example.com/"));
        assert_eq!(identity.header("authorization"), Some("Bearer t"));
        assert!(identity.proxy.is_none());
    }
}
