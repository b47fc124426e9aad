//! Download executors.
//!
//! A [`Downloader`] executes one [`DownloadTask`]: [`DirectDownloader`]
//! streams plain links to disk, [`MediaDownloader`] drives yt-dlp for media
//! formats. Both report [`DownloadProgress`] and honour the task's
//! [`CancelHandle`](crate::lifecycle::CancelHandle).

mod config;
mod direct;
mod error;
mod media;
mod naming;
mod traits;
mod types;

use std::sync::Arc;
use std::time::Duration;

pub use config::DownloadConfig;
pub use direct::DirectDownloader;
pub use error::DownloadError;
pub use media::{parse_destination_line, parse_progress, MediaDownloader, ProgressTracker};
pub use naming::{
    filename_from_content_disposition, filename_from_url, sanitize_filename, timestamped_filename,
};
pub use traits::Downloader;
pub use types::{DownloadParams, DownloadProgress, DownloadReport, DownloadTask};

use crate::engine::EngineConfig;
use crate::identity::IdentityBuilder;

/// The direct and media executors, configured.
pub fn build_downloaders(
    download: &DownloadConfig,
    engines: &EngineConfig,
    identities: Arc<IdentityBuilder>,
    kill_grace: Duration,
) -> Vec<Arc<dyn Downloader>> {
    vec![
        Arc::new(DirectDownloader::new(
            identities.clone(),
            Duration::from_secs(download.connect_timeout_secs),
            Duration::from_secs(download.stall_timeout_secs),
        )),
        Arc::new(MediaDownloader::new(
            engines.yt_dlp_path.clone(),
            engines.ffmpeg_path.clone(),
            download.merge_output_format.clone(),
            identities,
            kill_grace,
        )),
    ]
}
