//! Error types for the download executors.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::ProcessError;

/// Why a single item download failed.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download cancelled")]
    Cancelled,

    /// The download tool is not installed where configured.
    #[error("executable not found: {path}")]
    MissingBinary { path: PathBuf },

    /// Transport failure or error status.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The download tool exited unsuccessfully.
    #[error("download process failed (exit code {code:?}): {reason}")]
    ProcessFailed { code: Option<i32>, reason: String },

    /// No executor handles this kind of item.
    #[error("unsupported download: {0}")]
    Unsupported(String),
}

impl DownloadError {
    pub fn http(reason: impl Into<String>) -> Self {
        Self::Http(reason.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ProcessError> for DownloadError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound { program } => Self::MissingBinary { path: program },
            ProcessError::Cancelled => Self::Cancelled,
            ProcessError::Spawn { source, .. } => Self::Io(source),
            ProcessError::Timeout { timeout_secs } => Self::ProcessFailed {
                code: None,
                reason: format!("timed out after {} seconds", timeout_secs),
            },
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
