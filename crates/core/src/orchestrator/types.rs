//! Types for the task orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::download::DownloadTask;
use crate::engine::{Resolution, ResourceItem};
use crate::strategy::StrategyKind;

/// What the orchestrator is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    RunningSniff,
    RunningDownload,
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrchestratorState::Idle => "idle",
            OrchestratorState::RunningSniff => "running_sniff",
            OrchestratorState::RunningDownload => "running_download",
        };
        f.write_str(s)
    }
}

/// A unit of work submitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskDescriptor {
    /// Resolve a URL into downloadable items.
    Sniff { url: String },
    /// Download items one at a time, in order.
    Download { tasks: Vec<DownloadTask> },
}

impl TaskDescriptor {
    pub fn sniff(url: impl Into<String>) -> Self {
        Self::Sniff { url: url.into() }
    }

    pub fn download(tasks: Vec<DownloadTask>) -> Self {
        Self::Download { tasks }
    }
}

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Why a sniff produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SniffFailure {
    /// No strategy qualified for the URL.
    #[error("no strategy applies to this URL")]
    NoStrategy,

    /// Every queued strategy failed.
    #[error("all strategies failed ({}){}", join_kinds(attempted), last_error.as_deref().map(|e| format!(": {}", e)).unwrap_or_default())]
    Exhausted {
        attempted: Vec<StrategyKind>,
        last_error: Option<String>,
    },

    #[error("cancelled")]
    Cancelled,

    /// Setup problem: no engines, or every attempted engine was unavailable.
    #[error("configuration error: {0}")]
    Configuration(String),
}

fn join_kinds(kinds: &[StrategyKind]) -> String {
    kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

/// Terminal outcome of a sniff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// The strategy that produced the items.
    pub engine_used: Option<StrategyKind>,
    pub title: Option<String>,
    pub items: Vec<ResourceItem>,
    pub error: Option<SniffFailure>,
}

impl ResolutionResult {
    pub fn success(kind: StrategyKind, resolution: Resolution) -> Self {
        Self {
            engine_used: Some(kind),
            title: resolution.title,
            items: resolution.items,
            error: None,
        }
    }

    pub fn failure(error: SniffFailure) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// How one download item ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Completed {
        path: Option<PathBuf>,
        bytes: Option<u64>,
    },
    Failed {
        error: String,
    },
    Cancelled,
}

impl DownloadOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadOutcome::Completed { .. } => "completed",
            DownloadOutcome::Failed { .. } => "failed",
            DownloadOutcome::Cancelled => "cancelled",
        }
    }
}

/// Counts for a finished download queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Items never started because the queue was cleared.
    pub skipped: usize,
}

impl QueueSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.cancelled + self.skipped
    }
}

/// Everything the orchestrator reports, in order, per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    Log {
        task_id: String,
        level: LogLevel,
        message: String,
    },
    Progress {
        task_id: String,
        /// Position of the item in its queue.
        index: usize,
        item: String,
        percent: u8,
    },
    /// Not tied to a task (rejected submissions).
    Warning { message: String },
    SniffFinished {
        task_id: String,
        url: String,
        result: ResolutionResult,
    },
    DownloadFinished {
        task_id: String,
        index: usize,
        item: String,
        outcome: DownloadOutcome,
    },
    QueueFinished {
        task_id: String,
        summary: QueueSummary,
    },
}

impl OrchestratorEvent {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            OrchestratorEvent::Log { task_id, .. }
            | OrchestratorEvent::Progress { task_id, .. }
            | OrchestratorEvent::SniffFinished { task_id, .. }
            | OrchestratorEvent::DownloadFinished { task_id, .. }
            | OrchestratorEvent::QueueFinished { task_id, .. } => Some(task_id),
            OrchestratorEvent::Warning { .. } => None,
        }
    }

    /// The last event of its task.
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            OrchestratorEvent::SniffFinished { .. } | OrchestratorEvent::QueueFinished { .. }
        )
    }
}

/// Errors returned to the caller of the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Another task is running; the submission was not queued.
    #[error("orchestrator busy ({state})")]
    Busy { state: OrchestratorState },

    /// The submitted task has nothing to do.
    #[error("invalid task: {0}")]
    InvalidTask(String),
}
