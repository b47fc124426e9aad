use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::download::DownloadConfig;
use crate::engine::EngineConfig;
use crate::fetch::FetchConfig;
use crate::identity::IdentityConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::strategy::ScoringConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub robots: RobotsConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub experience: ExperienceConfig,
    #[serde(default)]
    pub engines: EngineConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// robots.txt compliance gate
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RobotsConfig {
    /// When false, every fetch behaves as if it were robots-exempt.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Crawler identity matched against `User-agent` groups.
    #[serde(default = "default_crawler_agent")]
    pub user_agent: String,
    /// Timeout for fetching a robots.txt file.
    #[serde(default = "default_robots_timeout")]
    pub timeout_secs: u64,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: default_crawler_agent(),
            timeout_secs: default_robots_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_crawler_agent() -> String {
    "linkscout".to_string()
}

fn default_robots_timeout() -> u64 {
    10
}

/// Experience store location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExperienceConfig {
    #[serde(default = "default_experience_path")]
    pub path: PathBuf,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            path: default_experience_path(),
        }
    }
}

fn default_experience_path() -> PathBuf {
    PathBuf::from("strategy_experience.json")
}
