//! Configuration for the resolve engines and the external tools they run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// External tool locations and engine timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// yt-dlp executable (name on `PATH` or absolute path).
    #[serde(default = "default_yt_dlp_path")]
    pub yt_dlp_path: PathBuf,
    /// ffmpeg executable handed to yt-dlp for merging. yt-dlp searches `PATH`
    /// when unset.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    /// Chromium/Chrome executable for headless rendering.
    #[serde(default = "default_browser_path")]
    pub browser_path: PathBuf,
    /// Virtual time the page gets to run scripts before the DOM is dumped.
    #[serde(default = "default_browser_wait_secs")]
    pub browser_wait_secs: u64,
    /// Hard limit for one headless browser run.
    #[serde(default = "default_browser_timeout_secs")]
    pub browser_timeout_secs: u64,
    /// Hard limit for `yt-dlp --dump-json`.
    #[serde(default = "default_media_probe_timeout_secs")]
    pub media_probe_timeout_secs: u64,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
    /// Environment variable holding a GitHub token.
    #[serde(default = "default_github_token_env")]
    pub github_token_env: String,
}

fn default_yt_dlp_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_browser_path() -> PathBuf {
    PathBuf::from("chromium")
}

fn default_browser_wait_secs() -> u64 {
    7
}

fn default_browser_timeout_secs() -> u64 {
    60
}

fn default_media_probe_timeout_secs() -> u64 {
    90
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: default_yt_dlp_path(),
            ffmpeg_path: None,
            browser_path: default_browser_path(),
            browser_wait_secs: default_browser_wait_secs(),
            browser_timeout_secs: default_browser_timeout_secs(),
            media_probe_timeout_secs: default_media_probe_timeout_secs(),
            github_api_url: default_github_api_url(),
            github_token_env: default_github_token_env(),
        }
    }
}
