//! Error types for the resolve engines.

use std::path::PathBuf;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::lifecycle::ProcessError;

/// Why a strategy attempt did not produce resources.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The strategy ran but found nothing usable.
    #[error("no resources found")]
    NoResources,

    /// The underlying HTTP fetch failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// An external tool is not installed where configured.
    #[error("executable not found: {path}")]
    MissingBinary { path: PathBuf },

    /// An external tool ran but failed.
    #[error("process failed: {0}")]
    Process(String),

    /// Output could not be interpreted.
    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// The URL does not fit this strategy.
    #[error("unsupported URL for this strategy: {0}")]
    InvalidUrl(String),

    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// A setup problem rather than a property of the URL.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingBinary { .. })
            || matches!(self, Self::Fetch(FetchError::NoEngines | FetchError::Configuration(_)))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Fetch(FetchError::Cancelled))
    }
}

impl From<ProcessError> for EngineError {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::NotFound { program } => Self::MissingBinary { path: program },
            ProcessError::Cancelled => Self::Cancelled,
            other => Self::Process(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_mapping() {
        let err: EngineError = ProcessError::NotFound {
            program: PathBuf::from("yt-dlp"),
        }
        .into();
        assert!(err.is_configuration());

        let err: EngineError = ProcessError::Cancelled.into();
        assert!(err.is_cancelled());

        let err: EngineError = ProcessError::Timeout { timeout_secs: 90 }.into();
        assert_eq!(err.to_string(), "process failed: process timed out after 90 seconds");
    }

    #[test]
    fn test_fetch_cancel_counts_as_cancelled() {
        let err = EngineError::from(FetchError::Cancelled);
        assert!(err.is_cancelled());
        assert!(!err.is_configuration());
    }
}
