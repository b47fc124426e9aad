//! Proxy pool with run-scoped bad-proxy tracking.

use std::collections::HashSet;
use std::path::Path;
use std::sync::RwLock;

use rand::seq::SliceRandom;
use tracing::{info, warn};

use super::types::IdentityError;

/// Proxies loaded once at startup, minus those marked bad during this run.
///
/// The bad set is the only mutable state here. It is shared by every identity
/// built in the process, so it sits behind a lock.
#[derive(Debug, Default)]
pub struct ProxyPool {
    proxies: Vec<String>,
    bad: RwLock<HashSet<String>>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies,
            bad: RwLock::new(HashSet::new()),
        }
    }

    /// An empty pool: identities are built without a proxy.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a newline-delimited proxy list. Blank lines and `#` comments are skipped.
    pub fn parse(contents: &str) -> Vec<String> {
        contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect()
    }

    /// Load from a file. A missing file yields an empty pool.
    pub fn load(path: &Path) -> Result<Self, IdentityError> {
        if !path.exists() {
            info!("Proxy file {:?} not found, running without proxies", path);
            return Ok(Self::empty());
        }
        let contents = std::fs::read_to_string(path)?;
        let proxies = Self::parse(&contents);
        info!("Loaded {} proxies from {:?}", proxies.len(), path);
        Ok(Self::new(proxies))
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Pick a random proxy not marked bad.
    pub fn pick(&self) -> Option<String> {
        if self.proxies.is_empty() {
            return None;
        }
        let bad = self.bad.read().unwrap_or_else(|e| e.into_inner());
        let available: Vec<&String> = self.proxies.iter().filter(|p| !bad.contains(*p)).collect();
        if available.is_empty() {
            warn!("All proxies have been marked bad");
            return None;
        }
        available
            .choose(&mut rand::thread_rng())
            .map(|p| (*p).clone())
    }

    /// Exclude a proxy for the remainder of the run.
    pub fn mark_bad(&self, proxy: &str) {
        let mut bad = self.bad.write().unwrap_or_else(|e| e.into_inner());
        if bad.insert(proxy.to_string()) {
            warn!(proxy = proxy, "Proxy marked bad");
        }
    }

    pub fn is_bad(&self, proxy: &str) -> bool {
        self.bad
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(proxy)
    }

    pub fn bad_count(&self) -> usize {
        self.bad.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
