//! Single-task execution orchestrator.
//!
//! The orchestrator owns the only running task:
//! - **Sniff**: strategy queue from the scorer, one engine attempt at a time,
//!   experience recorded on success
//! - **Download**: items drained one at a time; cancelling clears the queue
//!
//! Results and progress are reported as [`OrchestratorEvent`]s on a bounded
//! channel; each task's completion event is its last.

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::{EventReceiver, Orchestrator};
pub use types::{
    DownloadOutcome, LogLevel, OrchestratorError, OrchestratorEvent, OrchestratorState,
    QueueSummary, ResolutionResult, SniffFailure, TaskDescriptor,
};
pub use crate::download::{DownloadParams, DownloadTask};
