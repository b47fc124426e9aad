//! Trait definitions for the download executors.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::DownloadError;
use super::types::{DownloadProgress, DownloadReport, DownloadTask};
use crate::engine::ItemKind;
use crate::lifecycle::CancelHandle;

/// Executes one download.
#[async_trait]
pub trait Downloader: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this executor downloads items of `kind`.
    fn handles(&self, kind: ItemKind) -> bool;

    /// Download `task.item` into `task.destination`.
    ///
    /// Progress is reported on `progress_tx`; a dropped receiver does not
    /// stop the download. Cancellation stops the transfer and removes
    /// partial output where the executor owns it.
    async fn download(
        &self,
        task: &DownloadTask,
        progress_tx: mpsc::Sender<DownloadProgress>,
        cancel: &CancelHandle,
    ) -> Result<DownloadReport, DownloadError>;
}
