//! Streaming HTTP download of direct links.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Proxy};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::DownloadError;
use super::naming::{filename_from_content_disposition, filename_from_url, sanitize_filename, timestamped_filename};
use super::traits::Downloader;
use super::types::{DownloadProgress, DownloadReport, DownloadTask};
use crate::engine::ItemKind;
use crate::identity::{Identity, IdentityBuilder};
use crate::lifecycle::CancelHandle;

const CLIENT_MANAGED_HEADERS: &[&str] = &["accept-encoding", "connection"];

/// Downloads `ItemKind::Direct` items with a plain GET.
pub struct DirectDownloader {
    identities: Arc<IdentityBuilder>,
    connect_timeout: Duration,
    stall_timeout: Duration,
}

impl DirectDownloader {
    pub fn new(identities: Arc<IdentityBuilder>, connect_timeout: Duration, stall_timeout: Duration) -> Self {
        Self {
            identities,
            connect_timeout,
            stall_timeout,
        }
    }

    fn client(&self, identity: &Identity) -> Result<Client, DownloadError> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(10));
        if let Some(proxy) = &identity.proxy {
            let proxy = Proxy::all(proxy)
                .map_err(|e| DownloadError::http(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }
        Ok(builder.build()?)
    }

    async fn transfer(
        &self,
        response: reqwest::Response,
        path: &Path,
        progress_tx: &mpsc::Sender<DownloadProgress>,
        cancel: &CancelHandle,
    ) -> Result<u64, DownloadError> {
        let total = response.content_length().filter(|len| *len > 0);
        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut reported: Option<u8> = None;

        loop {
            let chunk = tokio::select! {
                chunk = tokio::time::timeout(self.stall_timeout, stream.next()) => match chunk {
                    Ok(chunk) => chunk,
                    Err(_) => {
                        return Err(DownloadError::http(format!(
                            "no data for {} seconds",
                            self.stall_timeout.as_secs()
                        )))
                    }
                },
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if let Some(total) = total {
                let percent = progress_percent(downloaded, total);
                if reported.map_or(true, |last| percent > last) {
                    reported = Some(percent);
                    let _ = progress_tx.try_send(DownloadProgress {
                        percent,
                        downloaded_bytes: Some(downloaded),
                        total_bytes: Some(total),
                    });
                }
            }
        }

        file.flush().await?;
        Ok(downloaded)
    }
}

#[async_trait]
impl Downloader for DirectDownloader {
    fn name(&self) -> &str {
        "direct"
    }

    fn handles(&self, kind: ItemKind) -> bool {
        kind == ItemKind::Direct
    }

    async fn download(
        &self,
        task: &DownloadTask,
        progress_tx: mpsc::Sender<DownloadProgress>,
        cancel: &CancelHandle,
    ) -> Result<DownloadReport, DownloadError> {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let url = task.item.url.as_str();
        let referer = (task.source_url != url).then_some(task.source_url.as_str());
        let identity = self.identities.build(referer, None);
        let client = self.client(&identity)?;

        let mut request = client.get(url);
        for (name, value) in &identity.headers {
            if CLIENT_MANAGED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            request = request.header(name.as_str(), value.as_str());
        }
        debug!(%url, identity = %identity.describe(), "Starting direct download");

        let response = tokio::select! {
            response = request.send() => response?,
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
        };
        if !response.status().is_success() {
            if let (401 | 403 | 407, Some(proxy)) = (response.status().as_u16(), &identity.proxy) {
                self.identities.proxies().mark_bad(proxy);
            }
            return Err(DownloadError::http(format!("HTTP {} for {}", response.status(), url)));
        }

        let header_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition);
        let filename = choose_filename(task, header_name, response.url().as_str());

        tokio::fs::create_dir_all(&task.destination).await?;
        let path = task.destination.join(&filename);
        info!("Downloading {} -> {}", url, path.display());

        match self.transfer(response, &path, &progress_tx, cancel).await {
            Ok(bytes) => {
                let _ = progress_tx
                    .send(DownloadProgress {
                        percent: 100,
                        downloaded_bytes: Some(bytes),
                        total_bytes: Some(bytes),
                    })
                    .await;
                info!("Finished {} ({} bytes)", path.display(), bytes);
                Ok(DownloadReport {
                    path: Some(path),
                    bytes: Some(bytes),
                })
            }
            Err(e) => {
                remove_partial(&path).await;
                Err(e)
            }
        }
    }
}

/// Explicit override, then `Content-Disposition`, then the resolved name,
/// then the final URL, then a timestamp.
fn choose_filename(task: &DownloadTask, from_header: Option<String>, final_url: &str) -> String {
    task.params
        .filename
        .as_deref()
        .map(sanitize_filename)
        .filter(|n| !n.is_empty())
        .or(from_header)
        .or_else(|| task.item.filename.as_deref().map(sanitize_filename).filter(|n| !n.is_empty()))
        .or_else(|| filename_from_url(final_url))
        .unwrap_or_else(timestamped_filename)
}

fn progress_percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (downloaded.saturating_mul(100) / total).min(100) as u8
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadParams;
    use crate::engine::ResourceItem;

    fn task(filename: Option<&str>) -> DownloadTask {
        DownloadTask::new(
            "https://example.com/page",
            ResourceItem::direct("https://cdn.example.com/f/file.zip", filename.map(str::to_string)),
            "/tmp/out",
        )
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 100), 0);
        assert_eq!(progress_percent(8192, 16384), 50);
        assert_eq!(progress_percent(200, 100), 100);
        assert_eq!(progress_percent(5, 0), 0);
    }

    #[test]
    fn test_choose_filename_precedence() {
        let url = "https://cdn.example.com/f/from-url.zip";

        let t = task(Some("resolved.zip")).with_params(DownloadParams {
            filename: Some("override.zip".to_string()),
            ..Default::default()
        });
        assert_eq!(choose_filename(&t, Some("header.zip".to_string()), url), "override.zip");

        let t = task(Some("resolved.zip"));
        assert_eq!(choose_filename(&t, Some("header.zip".to_string()), url), "header.zip");
        assert_eq!(choose_filename(&t, None, url), "resolved.zip");

        let t = task(None);
        assert_eq!(choose_filename(&t, None, url), "from-url.zip");
        assert!(choose_filename(&t, None, "https://cdn.example.com/").starts_with("download_"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let downloader = DirectDownloader::new(
            Arc::new(IdentityBuilder::with_defaults()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let cancel = CancelHandle::new();
        cancel.cancel().await;
        let (tx, _rx) = mpsc::channel(4);
        let result = downloader.download(&task(None), tx, &cancel).await;
        assert!(matches!(result, Err(DownloadError::Cancelled)));
    }

    #[tokio::test]
    async fn test_remove_partial_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.bin");
        tokio::fs::write(&path, b"abc").await.unwrap();
        remove_partial(&path).await;
        assert!(!path.exists());
        remove_partial(&path).await;
    }
}
