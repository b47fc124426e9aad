//! Mock downloader for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::download::{DownloadError, DownloadProgress, DownloadReport, DownloadTask, Downloader};
use crate::engine::ItemKind;
use crate::lifecycle::CancelHandle;

/// Mock implementation of the Downloader trait.
///
/// Each download walks through the configured progress steps, waiting
/// `step_delay` between them and stopping early on cancel. Queued errors are
/// returned after the steps.
///
/// # Example
///
/// ```rust,ignore
/// let downloader = MockDownloader::new(ItemKind::Direct);
/// downloader.set_progress_steps(vec![25, 50, 75]).await;
/// downloader.set_next_error(DownloadError::http("HTTP 500")).await;
/// ```
#[derive(Debug)]
pub struct MockDownloader {
    kind: ItemKind,
    started: Arc<RwLock<Vec<DownloadTask>>>,
    steps: Arc<RwLock<Vec<u8>>>,
    step_delay: Arc<RwLock<Duration>>,
    errors: Arc<RwLock<VecDeque<DownloadError>>>,
}

impl MockDownloader {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            started: Arc::new(RwLock::new(Vec::new())),
            steps: Arc::new(RwLock::new(vec![50])),
            step_delay: Arc::new(RwLock::new(Duration::ZERO)),
            errors: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    pub async fn set_progress_steps(&self, steps: Vec<u8>) {
        *self.steps.write().await = steps;
    }

    pub async fn set_step_delay(&self, delay: Duration) {
        *self.step_delay.write().await = delay;
    }

    /// Configure the next download to fail with the given error.
    pub async fn set_next_error(&self, error: DownloadError) {
        self.errors.write().await.push_back(error);
    }

    /// Tasks that were started, in order.
    pub async fn started_tasks(&self) -> Vec<DownloadTask> {
        self.started.read().await.clone()
    }

    pub async fn download_count(&self) -> usize {
        self.started.read().await.len()
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    fn name(&self) -> &str {
        "mock"
    }

    fn handles(&self, kind: ItemKind) -> bool {
        kind == self.kind
    }

    async fn download(
        &self,
        task: &DownloadTask,
        progress_tx: mpsc::Sender<DownloadProgress>,
        cancel: &CancelHandle,
    ) -> Result<DownloadReport, DownloadError> {
        self.started.write().await.push(task.clone());
        let steps = self.steps.read().await.clone();
        let delay = *self.step_delay.read().await;

        for percent in steps {
            if cancel.is_cancelled() {
                return Err(DownloadError::Cancelled);
            }
            let _ = progress_tx.send(DownloadProgress::percent(percent)).await;
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                }
            }
        }

        if let Some(error) = self.errors.write().await.pop_front() {
            return Err(error);
        }
        let _ = progress_tx.send(DownloadProgress::percent(100)).await;
        Ok(DownloadReport {
            path: Some(task.destination.join(task.item.label())),
            bytes: task.item.size,
        })
    }
}
