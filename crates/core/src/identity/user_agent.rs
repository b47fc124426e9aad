//! User agent sources.

use rand::seq::SliceRandom;

use super::types::IdentityError;

/// Used when the configured source fails.
pub const FALLBACK_USER_AGENTS: [&str; 2] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const BUILTIN_CATALOG: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36 Edg/121.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.6261.64 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_3 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Mobile/15E148 Safari/604.1",
];

/// A generator of user agent strings. May fail; the identity builder then
/// falls back to [`FALLBACK_USER_AGENTS`].
pub trait UserAgentSource: Send + Sync {
    fn generate(&self) -> Result<String, IdentityError>;
}

/// Random pick from a fixed catalog (the built-in one or a configured list).
#[derive(Debug, Clone)]
pub struct CatalogUserAgents {
    agents: Vec<String>,
}

impl CatalogUserAgents {
    pub fn new(agents: Vec<String>) -> Self {
        Self { agents }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_CATALOG.iter().map(|s| s.to_string()).collect())
    }

    /// Configured list when non-empty, built-in catalog otherwise.
    pub fn from_config(agents: &[String]) -> Self {
        if agents.is_empty() {
            Self::builtin()
        } else {
            Self::new(agents.to_vec())
        }
    }
}

impl UserAgentSource for CatalogUserAgents {
    fn generate(&self) -> Result<String, IdentityError> {
        self.agents
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| IdentityError::UserAgentUnavailable("catalog is empty".to_string()))
    }
}
