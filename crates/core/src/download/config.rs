//! Configuration for the download executors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Download destination and transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Default destination directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Container yt-dlp merges separate video and audio streams into.
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// A direct transfer fails when no data arrives for this long.
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_merge_output_format() -> String {
    "mp4".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_stall_timeout_secs() -> u64 {
    60
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            merge_output_format: default_merge_output_format(),
            connect_timeout_secs: default_connect_timeout_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}
