//! Task orchestrator implementation.
//!
//! Runs at most one task at a time in a background Tokio task:
//! - Sniff: walk the scorer's strategy queue until an engine finds items
//! - Download: drain the item queue one at a time
//!
//! Every task ends with exactly one completion event.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::download::{DownloadError, DownloadProgress, DownloadTask, Downloader};
use crate::engine::EngineError;
use crate::experience::domain_of;
use crate::identity::IdentityBuilder;
use crate::lifecycle::CancelHandle;
use crate::metrics;
use crate::strategy::{EngineRegistry, StrategyKind, StrategyScorer};

use super::config::OrchestratorConfig;
use super::types::{
    DownloadOutcome, LogLevel, OrchestratorError, OrchestratorEvent, OrchestratorState,
    QueueSummary, ResolutionResult, SniffFailure, TaskDescriptor,
};

/// Receiving end of the orchestrator's event stream.
pub type EventReceiver = mpsc::Receiver<OrchestratorEvent>;

/// Drives sniff and download tasks, one at a time.
///
/// Cloning shares the same orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    config: OrchestratorConfig,
    scorer: Arc<StrategyScorer>,
    registry: Arc<EngineRegistry>,
    identities: Arc<IdentityBuilder>,
    downloaders: Vec<Arc<dyn Downloader>>,
    events: mpsc::Sender<OrchestratorEvent>,
    /// Serializes submission against completion so that a task is only
    /// observed as finished after its completion event was delivered.
    gate: tokio::sync::Mutex<()>,
    current: Mutex<Current>,
}

struct Current {
    state: OrchestratorState,
    task_id: Option<String>,
    cancel: Option<CancelHandle>,
}

impl Orchestrator {
    /// Create an orchestrator and the receiver for its events.
    ///
    /// The receiver must be drained; a full channel pauses the running task.
    pub fn new(
        config: OrchestratorConfig,
        scorer: Arc<StrategyScorer>,
        registry: Arc<EngineRegistry>,
        identities: Arc<IdentityBuilder>,
        downloaders: Vec<Arc<dyn Downloader>>,
    ) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::channel(config.event_buffer.max(1));
        let inner = Inner {
            config,
            scorer,
            registry,
            identities,
            downloaders,
            events,
            gate: tokio::sync::Mutex::new(()),
            current: Mutex::new(Current {
                state: OrchestratorState::Idle,
                task_id: None,
                cancel: None,
            }),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Start `task` in the background and return its id.
    ///
    /// Rejected with a `Warning` event and [`OrchestratorError::Busy`] while
    /// another task runs; rejected tasks are not queued.
    pub async fn submit(&self, task: TaskDescriptor) -> Result<String, OrchestratorError> {
        if let TaskDescriptor::Download { tasks } = &task {
            if tasks.is_empty() {
                return Err(OrchestratorError::InvalidTask("empty download queue".to_string()));
            }
        }

        let gate = self.inner.gate.lock().await;
        let (task_id, cancel) = {
            let mut current = self.inner.lock_current();
            if current.state != OrchestratorState::Idle {
                let state = current.state;
                drop(current);
                drop(gate);
                metrics::TASKS_REJECTED.inc();
                warn!("Rejecting submission, orchestrator is {}", state);
                self.inner
                    .emit(OrchestratorEvent::Warning {
                        message: format!("a task is already running ({}); submission ignored", state),
                    })
                    .await;
                return Err(OrchestratorError::Busy { state });
            }

            let task_id = Uuid::new_v4().to_string();
            let cancel = CancelHandle::new();
            current.state = match task {
                TaskDescriptor::Sniff { .. } => OrchestratorState::RunningSniff,
                TaskDescriptor::Download { .. } => OrchestratorState::RunningDownload,
            };
            current.task_id = Some(task_id.clone());
            current.cancel = Some(cancel.clone());
            (task_id, cancel)
        };
        drop(gate);

        info!(task_id = %task_id, "Starting task");
        let inner = Arc::clone(&self.inner);
        let id = task_id.clone();
        tokio::spawn(async move {
            let completion = match task {
                TaskDescriptor::Sniff { url } => {
                    let result = inner.run_sniff(&id, &url, &cancel).await;
                    OrchestratorEvent::SniffFinished {
                        task_id: id.clone(),
                        url,
                        result,
                    }
                }
                TaskDescriptor::Download { tasks } => {
                    let summary = inner.run_downloads(&id, tasks, &cancel).await;
                    OrchestratorEvent::QueueFinished {
                        task_id: id.clone(),
                        summary,
                    }
                }
            };
            inner.finish(completion).await;
        });

        Ok(task_id)
    }

    /// Cancel the running task. Idempotent; returns `false` when idle.
    ///
    /// Returns once the task's registered process or session is torn down.
    pub async fn stop(&self) -> bool {
        let (task_id, cancel) = {
            let current = self.inner.lock_current();
            (current.task_id.clone(), current.cancel.clone())
        };
        match cancel {
            Some(cancel) => {
                info!(task_id = ?task_id, "Stop requested");
                cancel.cancel().await;
                true
            }
            None => {
                debug!("Stop requested while idle");
                false
            }
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.inner.lock_current().state
    }

    /// Id of the running task, if any.
    pub fn current_task(&self) -> Option<String> {
        self.inner.lock_current().task_id.clone()
    }

    pub fn kill_grace(&self) -> Duration {
        self.inner.config.kill_grace()
    }
}

impl Inner {
    fn lock_current(&self) -> MutexGuard<'_, Current> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn emit(&self, event: OrchestratorEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }

    async fn log(&self, task_id: &str, level: LogLevel, message: String) {
        match level {
            LogLevel::Debug => debug!(task_id, "{}", message),
            LogLevel::Info => info!(task_id, "{}", message),
            LogLevel::Warn => warn!(task_id, "{}", message),
            LogLevel::Error => error!(task_id, "{}", message),
        }
        self.emit(OrchestratorEvent::Log {
            task_id: task_id.to_string(),
            level,
            message,
        })
        .await;
    }

    /// Deliver the completion event, then go idle.
    async fn finish(&self, completion: OrchestratorEvent) {
        let _gate = self.gate.lock().await;
        self.emit(completion).await;
        let mut current = self.lock_current();
        current.state = OrchestratorState::Idle;
        current.task_id = None;
        current.cancel = None;
    }

    async fn run_sniff(&self, task_id: &str, url: &str, cancel: &CancelHandle) -> ResolutionResult {
        let started = Instant::now();
        let result = self.sniff(task_id, url, cancel).await;
        let label = match &result.error {
            None => "success",
            Some(SniffFailure::NoStrategy) => "no_strategy",
            Some(SniffFailure::Exhausted { .. }) => "exhausted",
            Some(SniffFailure::Cancelled) => "cancelled",
            Some(SniffFailure::Configuration(_)) => "configuration",
        };
        metrics::observe_sniff(label, started.elapsed().as_secs_f64());
        result
    }

    async fn sniff(&self, task_id: &str, url: &str, cancel: &CancelHandle) -> ResolutionResult {
        if self.registry.is_empty() {
            self.log(task_id, LogLevel::Error, "No resolve engines registered".to_string())
                .await;
            return ResolutionResult::failure(SniffFailure::Configuration(
                "no resolve engines registered".to_string(),
            ));
        }

        let queue = self.scorer.select(url);
        if queue.is_empty() {
            self.log(task_id, LogLevel::Warn, format!("No strategy applies to {}", url))
                .await;
            return ResolutionResult::failure(SniffFailure::NoStrategy);
        }
        let names: Vec<&str> = queue.iter().map(|k| k.as_str()).collect();
        self.log(
            task_id,
            LogLevel::Info,
            format!("Strategy queue for {}: {}", url, names.join(" -> ")),
        )
        .await;

        let domain = domain_of(url);
        let mut attempted: Vec<StrategyKind> = Vec::new();
        let mut last_error: Option<String> = None;
        let mut only_configuration = true;

        for kind in queue {
            if cancel.is_cancelled() {
                return self.sniff_cancelled(task_id).await;
            }
            attempted.push(kind);

            let engine = match self.registry.get(kind) {
                Ok(engine) => engine,
                Err(e) => {
                    metrics::record_strategy_attempt(kind.as_str(), "unavailable");
                    self.log(task_id, LogLevel::Warn, format!("Configuration problem: {}", e))
                        .await;
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            self.log(task_id, LogLevel::Info, format!("Trying {}", kind)).await;
            let identity = self.identities.build(None, None);
            let outcome = tokio::select! {
                outcome = engine.attempt(url, &identity, cancel) => outcome,
                _ = cancel.cancelled() => Err(EngineError::Cancelled),
            };

            match outcome {
                Ok(resolution) if !resolution.is_empty() => {
                    metrics::record_strategy_attempt(kind.as_str(), "success");
                    if let Some(domain) = &domain {
                        match self.scorer.experience().record(domain, kind) {
                            Ok(count) => debug!(task_id, "Experience {} / {} = {}", domain, kind, count),
                            Err(e) => warn!(task_id, "Failed to persist experience: {}", e),
                        }
                    }
                    self.log(
                        task_id,
                        LogLevel::Info,
                        format!("{} found {} items", kind, resolution.items.len()),
                    )
                    .await;
                    return ResolutionResult::success(kind, resolution);
                }
                Ok(_) => {
                    only_configuration = false;
                    metrics::record_strategy_attempt(kind.as_str(), "no_resources");
                    self.log(task_id, LogLevel::Info, format!("{} found nothing", kind))
                        .await;
                    last_error = Some(EngineError::NoResources.to_string());
                }
                Err(e) if e.is_cancelled() => {
                    metrics::record_strategy_attempt(kind.as_str(), "cancelled");
                    return self.sniff_cancelled(task_id).await;
                }
                Err(e) if e.is_configuration() => {
                    metrics::record_strategy_attempt(kind.as_str(), "unavailable");
                    self.log(
                        task_id,
                        LogLevel::Warn,
                        format!("{} unavailable (configuration): {}", kind, e),
                    )
                    .await;
                    last_error = Some(e.to_string());
                }
                Err(e) => {
                    only_configuration = false;
                    let result = if matches!(e, EngineError::NoResources) {
                        "no_resources"
                    } else {
                        "failed"
                    };
                    metrics::record_strategy_attempt(kind.as_str(), result);
                    self.log(task_id, LogLevel::Warn, format!("{} failed: {}", kind, e))
                        .await;
                    last_error = Some(e.to_string());
                }
            }
        }

        if cancel.is_cancelled() {
            return self.sniff_cancelled(task_id).await;
        }

        let failure = if only_configuration {
            SniffFailure::Configuration(
                last_error.unwrap_or_else(|| "no usable engine".to_string()),
            )
        } else {
            SniffFailure::Exhausted {
                attempted,
                last_error,
            }
        };
        self.log(task_id, LogLevel::Error, format!("Sniff failed: {}", failure))
            .await;
        ResolutionResult::failure(failure)
    }

    async fn sniff_cancelled(&self, task_id: &str) -> ResolutionResult {
        self.log(task_id, LogLevel::Warn, "Sniff cancelled".to_string()).await;
        ResolutionResult::failure(SniffFailure::Cancelled)
    }

    async fn run_downloads(
        &self,
        task_id: &str,
        tasks: Vec<DownloadTask>,
        cancel: &CancelHandle,
    ) -> QueueSummary {
        let mut summary = QueueSummary::default();
        let mut queue: VecDeque<(usize, DownloadTask)> = tasks.into_iter().enumerate().collect();
        self.log(
            task_id,
            LogLevel::Info,
            format!("Download queue of {} items", queue.len()),
        )
        .await;

        while let Some((index, task)) = queue.pop_front() {
            if cancel.is_cancelled() {
                summary.skipped += 1 + queue.len();
                queue.clear();
                break;
            }

            let label = task.item.label();
            let outcome = match self.downloaders.iter().find(|d| d.handles(task.item.kind)) {
                Some(downloader) => {
                    self.log(
                        task_id,
                        LogLevel::Info,
                        format!("Downloading {} with {}", label, downloader.name()),
                    )
                    .await;
                    let result = self
                        .download_one(task_id, index, &label, downloader.as_ref(), &task, cancel)
                        .await;
                    let outcome = match result {
                        Ok(report) => DownloadOutcome::Completed {
                            path: report.path,
                            bytes: report.bytes,
                        },
                        Err(e) if e.is_cancelled() || cancel.is_cancelled() => DownloadOutcome::Cancelled,
                        Err(e) => DownloadOutcome::Failed {
                            error: e.to_string(),
                        },
                    };
                    metrics::record_download(downloader.name(), outcome.as_str());
                    outcome
                }
                None => DownloadOutcome::Failed {
                    error: DownloadError::Unsupported(format!("no executor for {:?} items", task.item.kind))
                        .to_string(),
                },
            };

            match &outcome {
                DownloadOutcome::Completed { .. } => summary.completed += 1,
                DownloadOutcome::Failed { error } => {
                    summary.failed += 1;
                    self.log(task_id, LogLevel::Warn, format!("{} failed: {}", label, error))
                        .await;
                }
                DownloadOutcome::Cancelled => summary.cancelled += 1,
            }
            let cancelled = outcome == DownloadOutcome::Cancelled;
            self.emit(OrchestratorEvent::DownloadFinished {
                task_id: task_id.to_string(),
                index,
                item: label,
                outcome,
            })
            .await;

            if cancelled {
                if !queue.is_empty() {
                    self.log(
                        task_id,
                        LogLevel::Warn,
                        format!("Cancelled, dropping {} queued items", queue.len()),
                    )
                    .await;
                }
                summary.skipped += queue.len();
                queue.clear();
                break;
            }
        }

        for _ in 0..summary.skipped {
            metrics::record_download("queue", "skipped");
        }
        self.log(
            task_id,
            LogLevel::Info,
            format!(
                "Queue finished: {} completed, {} failed, {} cancelled, {} skipped",
                summary.completed, summary.failed, summary.cancelled, summary.skipped
            ),
        )
        .await;
        summary
    }

    /// Run one download, forwarding its progress as events in order.
    async fn download_one(
        &self,
        task_id: &str,
        index: usize,
        label: &str,
        downloader: &dyn Downloader,
        task: &DownloadTask,
        cancel: &CancelHandle,
    ) -> Result<crate::download::DownloadReport, DownloadError> {
        let (tx, mut rx) = mpsc::channel::<DownloadProgress>(64);
        let download = downloader.download(task, tx, cancel);
        tokio::pin!(download);

        let mut last_percent: Option<u8> = None;
        let result = loop {
            tokio::select! {
                biased;
                Some(progress) = rx.recv() => {
                    self.forward_progress(task_id, index, label, progress, &mut last_percent).await;
                }
                result = &mut download => break result,
                _ = cancel.cancelled() => {
                    // executors clean up on cancel; give them the grace period to do so
                    break match tokio::time::timeout(self.config.kill_grace(), &mut download).await {
                        Ok(result) => result,
                        Err(_) => Err(DownloadError::Cancelled),
                    };
                }
            }
        };

        while let Ok(progress) = rx.try_recv() {
            self.forward_progress(task_id, index, label, progress, &mut last_percent)
                .await;
        }
        result
    }

    async fn forward_progress(
        &self,
        task_id: &str,
        index: usize,
        label: &str,
        progress: DownloadProgress,
        last_percent: &mut Option<u8>,
    ) {
        if last_percent.is_some_and(|last| progress.percent <= last) {
            return;
        }
        *last_percent = Some(progress.percent);
        self.emit(OrchestratorEvent::Progress {
            task_id: task_id.to_string(),
            index,
            item: label.to_string(),
            percent: progress.percent,
        })
        .await;
    }
}
