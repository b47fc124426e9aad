//! Types for the download executors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::ResourceItem;

/// Per-task overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadParams {
    /// File name to use instead of the detected one (direct downloads).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Merge container instead of the configured one (media downloads).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_output_format: Option<String>,
}

/// One item to download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    /// The URL the item was resolved from.
    pub source_url: String,
    pub item: ResourceItem,
    /// Destination directory.
    pub destination: PathBuf,
    #[serde(default)]
    pub params: DownloadParams,
}

impl DownloadTask {
    pub fn new(source_url: impl Into<String>, item: ResourceItem, destination: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            item,
            destination: destination.into(),
            params: DownloadParams::default(),
        }
    }

    pub fn with_params(mut self, params: DownloadParams) -> Self {
        self.params = params;
        self
    }
}

/// Progress of the item currently downloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// 0..=100, never decreasing within one item.
    pub percent: u8,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            downloaded_bytes: None,
            total_bytes: None,
        }
    }
}

/// A finished download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReport {
    /// Where the file landed, when known.
    pub path: Option<PathBuf>,
    pub bytes: Option<u64>,
}
