//! Media downloads through yt-dlp.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::DownloadError;
use super::traits::Downloader;
use super::types::{DownloadProgress, DownloadReport, DownloadTask};
use crate::engine::{ItemKind, BEST_FORMAT};
use crate::identity::{Identity, IdentityBuilder};
use crate::lifecycle::{CancelHandle, CommandSpec, ProcessHandle};

/// Prefix of the progress lines requested with `--progress-template`.
const PROGRESS_TAG: &str = "download-stream:";

static PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"download-stream:\s*(\d+(\.\d+)?)%").unwrap());

/// Downloads `ItemKind::MediaFormat` items with yt-dlp.
pub struct MediaDownloader {
    yt_dlp: PathBuf,
    ffmpeg: Option<PathBuf>,
    merge_output_format: String,
    identities: Arc<IdentityBuilder>,
    kill_grace: Duration,
}

impl MediaDownloader {
    pub fn new(
        yt_dlp: impl Into<PathBuf>,
        ffmpeg: Option<PathBuf>,
        merge_output_format: impl Into<String>,
        identities: Arc<IdentityBuilder>,
        kill_grace: Duration,
    ) -> Self {
        Self {
            yt_dlp: yt_dlp.into(),
            ffmpeg,
            merge_output_format: merge_output_format.into(),
            identities,
            kill_grace,
        }
    }

    pub fn command(&self, task: &DownloadTask, identity: &Identity) -> CommandSpec {
        let format = task.item.format_id.as_deref().unwrap_or(BEST_FORMAT);
        let template = task
            .destination
            .join("%(title)s [%(id)s][%(format_id)s].%(ext)s");
        let merge = task
            .params
            .merge_output_format
            .as_deref()
            .unwrap_or(&self.merge_output_format);

        let mut spec = CommandSpec::new(&self.yt_dlp)
            .args(["-f", format])
            .arg("--output")
            .arg(template.to_string_lossy())
            .args([
                "--merge-output-format",
                merge,
                "--no-warnings",
                "--newline",
                "--progress",
                "--progress-template",
            ])
            .arg(format!("{}%(progress._percent_str)s", PROGRESS_TAG));
        if let Some(ffmpeg) = &self.ffmpeg {
            spec = spec.arg("--ffmpeg-location").arg(ffmpeg.to_string_lossy());
        }
        if let Some(proxy) = &identity.proxy {
            spec = spec.args(["--proxy", proxy.as_str()]);
        }
        spec.args(["--user-agent", identity.user_agent.as_str()])
            .arg(task.item.url.as_str())
    }
}

#[async_trait]
impl Downloader for MediaDownloader {
    fn name(&self) -> &str {
        "media"
    }

    fn handles(&self, kind: ItemKind) -> bool {
        kind == ItemKind::MediaFormat
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
        tokio::fs::create_dir_all(&task.destination).await?;

        let identity = self.identities.build(None, None);
        let spec = self.command(task, &identity);
        info!("Running {}", spec.display());

        let handle = Arc::new(ProcessHandle::start(&spec, self.kill_grace)?);
        let _guard = cancel.register(handle.clone());
        let mut output = handle.take_output().ok_or(DownloadError::Cancelled)?;

        let mut tracker = ProgressTracker::default();
        let mut destination: Option<PathBuf> = None;
        let mut last_error: Option<String> = None;

        loop {
            let line = tokio::select! {
                line = output.next_line() => line,
                _ = cancel.cancelled() => {
                    handle.terminate().await;
                    return Err(DownloadError::Cancelled);
                }
            };
            let Some(line) = line else { break };

            if let Some(percent) = tracker.observe(&line) {
                let _ = progress_tx.try_send(DownloadProgress::percent(percent));
                continue;
            }
            if let Some(path) = parse_destination_line(&line) {
                destination = Some(path);
            }
            if line.starts_with("ERROR") {
                warn!("yt-dlp: {}", line);
                last_error = Some(line);
            } else if !line.trim().is_empty() {
                debug!("yt-dlp: {}", line);
            }
        }

        let exit = handle.wait().await;
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        if !exit.success {
            return Err(DownloadError::ProcessFailed {
                code: exit.code,
                reason: last_error.unwrap_or_else(|| "yt-dlp failed".to_string()),
            });
        }

        let _ = progress_tx.send(DownloadProgress::percent(100)).await;
        let bytes = match &destination {
            Some(path) => file_size(path).await,
            None => None,
        };
        info!("Media download finished: {:?}", destination);
        Ok(DownloadReport {
            path: destination,
            bytes,
        })
    }
}

/// Keeps reported percentages non-decreasing.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: Option<u8>,
}

impl ProgressTracker {
    /// New percentage from a progress line, `None` unless it moves forward.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        let percent = parse_progress(line)?;
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }

    pub fn last(&self) -> Option<u8> {
        self.last
    }
}

/// Percentage from a `download-stream:` line, truncated to an integer.
pub fn parse_progress(line: &str) -> Option<u8> {
    if !line.contains(PROGRESS_TAG) {
        return None;
    }
    let caps = PROGRESS_RE.captures(line)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u8)
}

/// Output path announced by yt-dlp, if `line` is such an announcement.
pub fn parse_destination_line(line: &str) -> Option<PathBuf> {
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into \"") {
        return rest.strip_suffix('"').map(PathBuf::from);
    }
    if let Some(rest) = line.strip_prefix("[download] Destination: ") {
        return Some(PathBuf::from(rest.trim()));
    }
    let rest = line.strip_prefix("[download] ")?;
    let path = rest.strip_suffix(" has already been downloaded")?;
    Some(PathBuf::from(path.trim()))
}

async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadParams;
    use crate::engine::{ResourceCategory, ResourceItem};
    use crate::identity::TlsProfile;

    fn identity() -> Identity {
        Identity {
            user_agent: "UA/3.0".to_string(),
            proxy: Some("http://proxy:3128".to_string()),
            headers: Vec::new(),
            tls_profile: TlsProfile::Chrome116,
        }
    }

    fn downloader(yt_dlp: &str) -> MediaDownloader {
        MediaDownloader::new(
            yt_dlp,
            Some(PathBuf::from("/opt/ffmpeg")),
            "mp4",
            Arc::new(IdentityBuilder::with_defaults()),
            Duration::from_secs(1),
        )
    }

    fn media_task(dest: &Path) -> DownloadTask {
        DownloadTask::new(
            "https://v.example/watch?v=1",
            ResourceItem::media("https://v.example/watch?v=1", "137+140", ResourceCategory::Video),
            dest,
        )
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("download-stream:  42.7%"), Some(42));
        assert_eq!(parse_progress("download-stream:100%"), Some(100));
        assert_eq!(parse_progress("download-stream:   N/A%"), None);
        assert_eq!(parse_progress("[download]  42.7% of 10MiB"), None);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.observe("download-stream: 10.0%"), Some(10));
        assert_eq!(tracker.observe("download-stream: 55.5%"), Some(55));
        // second stream of a merged download starts from zero again
        assert_eq!(tracker.observe("download-stream: 3.0%"), None);
        assert_eq!(tracker.observe("download-stream: 55.9%"), None);
        assert_eq!(tracker.observe("download-stream: 80%"), Some(80));
        assert_eq!(tracker.last(), Some(80));
    }

    #[test]
    fn test_parse_destination_line() {
        assert_eq!(
            parse_destination_line("[Merger] Merging formats into \"/tmp/out/clip [1][137+140].mp4\""),
            Some(PathBuf::from("/tmp/out/clip [1][137+140].mp4"))
        );
        assert_eq!(
            parse_destination_line("[download] Destination: /tmp/out/a.m4a"),
            Some(PathBuf::from("/tmp/out/a.m4a"))
        );
        assert_eq!(
            parse_destination_line("[download] /tmp/out/a.m4a has already been downloaded"),
            Some(PathBuf::from("/tmp/out/a.m4a"))
        );
        assert_eq!(parse_destination_line("[youtube] Extracting URL"), None);
    }

    #[test]
    fn test_command_args() {
        let dest = Path::new("/tmp/out");
        let spec = downloader("yt-dlp").command(&media_task(dest), &identity());
        let args = spec.args.join(" ");
        assert!(args.starts_with("-f 137+140 --output /tmp/out/%(title)s [%(id)s][%(format_id)s].%(ext)s"));
        assert!(args.contains("--merge-output-format mp4"));
        assert!(args.contains("--newline --progress --progress-template download-stream:%(progress._percent_str)s"));
        assert!(args.contains("--ffmpeg-location /opt/ffmpeg"));
        assert!(args.contains("--proxy http://proxy:3128"));
        assert_eq!(spec.args.last().map(String::as_str), Some("https://v.example/watch?v=1"));
    }

    #[test]
    fn test_merge_format_override() {
        let task = media_task(Path::new("/tmp/out")).with_params(DownloadParams {
            merge_output_format: Some("mkv".to_string()),
            ..Default::default()
        });
        let spec = downloader("yt-dlp").command(&task, &identity());
        assert!(spec.args.join(" ").contains("--merge-output-format mkv"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let result = downloader("/nonexistent/yt-dlp-for-tests")
            .download(&media_task(dir.path()), tx, &CancelHandle::new())
            .await;
        assert!(matches!(result, Err(DownloadError::MissingBinary { .. })));
    }

    /// Executable stand-in for yt-dlp that ignores its arguments.
    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> MediaDownloader {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-yt-dlp");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        MediaDownloader::new(
            script,
            None,
            "mp4",
            Arc::new(IdentityBuilder::with_defaults()),
            Duration::from_secs(1),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_reports_progress_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("clip [1][137+140].mp4");
        let body = format!(
            "echo 'download-stream:  12.5%'\n\
             echo 'download-stream:  60.0%'\n\
             echo 'download-stream:  40.0%'\n\
             printf 'abcd' > '{path}'\n\
             echo '[Merger] Merging formats into \"{path}\"'",
            path = output.display()
        );
        let downloader = fake_tool(dir.path(), &body);

        let (tx, mut rx) = mpsc::channel(16);
        let report = downloader
            .download(&media_task(dir.path()), tx, &CancelHandle::new())
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(progress) = rx.try_recv() {
            seen.push(progress.percent);
        }
        assert_eq!(seen, vec![12, 60, 100]);
        assert_eq!(report.path, Some(output));
        assert_eq!(report.bytes, Some(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_download_failure_carries_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = fake_tool(dir.path(), "echo 'ERROR: [youtube] 1: Video unavailable'\nexit 1");

        let (tx, mut rx) = mpsc::channel(16);
        let result = downloader
            .download(&media_task(dir.path()), tx, &CancelHandle::new())
            .await;
        match result {
            Err(DownloadError::ProcessFailed { code, reason }) => {
                assert_eq!(code, Some(1));
                assert!(reason.contains("Video unavailable"));
            }
            other => panic!("expected ProcessFailed, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_stops_running_download() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = fake_tool(dir.path(), "echo 'download-stream:  5.0%'\nexec sleep 30");
        let task = media_task(dir.path());
        let cancel = CancelHandle::new();
        let (tx, mut rx) = mpsc::channel(16);

        let running = {
            let cancel = cancel.clone();
            tokio::spawn(async move { downloader.download(&task, tx, &cancel).await })
        };
        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("progress should arrive")
            .unwrap();
        assert_eq!(first.percent, 5);
        cancel.cancel().await;

        let result = tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .expect("download should stop promptly")
            .unwrap();
        assert!(matches!(result, Err(DownloadError::Cancelled)));
    }
}
