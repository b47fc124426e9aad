//! JSON-backed success counts per domain and strategy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::strategy::StrategyKind;

/// Errors while persisting experience.
#[derive(Debug, Error)]
pub enum ExperienceError {
    #[error("failed to write experience file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize experience: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// `{ domain: { strategy: count } }`
pub type ExperienceSnapshot = BTreeMap<String, BTreeMap<String, u32>>;

/// Lowercase host with one leading `www.` removed.
pub fn normalize_domain(host: &str) -> String {
    let lower = host.trim().to_ascii_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// Normalized domain of a URL, `None` if it does not parse or has no host.
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str().map(normalize_domain)
}

/// Which strategies have worked for which domains.
///
/// Loaded once at startup. Every [`record`](Self::record) rewrites the whole
/// file. Strategy names the current build does not know are kept as-is.
#[derive(Debug, Default)]
pub struct ExperienceStore {
    path: Option<PathBuf>,
    data: RwLock<ExperienceSnapshot>,
}

impl ExperienceStore {
    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`. A missing file starts empty; an unreadable or corrupt
    /// one is logged and also starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<ExperienceSnapshot>(&content) {
                Ok(data) => {
                    info!("Loaded experience for {} domains from {:?}", data.len(), path);
                    data
                }
                Err(e) => {
                    warn!("Experience file {:?} is corrupt ({}), starting empty", path, e);
                    ExperienceSnapshot::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No experience file at {:?}", path);
                ExperienceSnapshot::new()
            }
            Err(e) => {
                warn!("Failed to read experience file {:?} ({}), starting empty", path, e);
                ExperienceSnapshot::new()
            }
        };
        Self {
            path: Some(path),
            data: RwLock::new(data),
        }
    }

    /// In-memory store seeded with data.
    pub fn from_snapshot(data: ExperienceSnapshot) -> Self {
        Self {
            path: None,
            data: RwLock::new(data),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn success_count(&self, domain: &str, strategy: StrategyKind) -> u32 {
        let domain = normalize_domain(domain);
        self.data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&domain)
            .and_then(|m| m.get(strategy.as_str()))
            .copied()
            .unwrap_or(0)
    }

    /// Count one confirmed success and persist the store.
    ///
    /// The in-memory count is updated even if writing the file fails.
    pub fn record(&self, domain: &str, strategy: StrategyKind) -> Result<u32, ExperienceError> {
        let domain = normalize_domain(domain);
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        let count = {
            let entry = data
                .entry(domain.clone())
                .or_default()
                .entry(strategy.as_str().to_string())
                .or_insert(0);
            *entry = entry.saturating_add(1);
            *entry
        };
        info!(domain = %domain, strategy = %strategy, count, "Experience updated");

        if let Some(path) = &self.path {
            // written under the lock so concurrent records cannot interleave
            write_atomically(path, &data)?;
        }
        Ok(count)
    }

    pub fn snapshot(&self) -> ExperienceSnapshot {
        self.data.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn write_atomically(path: &Path, data: &ExperienceSnapshot) -> Result<(), ExperienceError> {
    let json = serde_json::to_string_pretty(data)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
