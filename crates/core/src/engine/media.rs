//! Media format listing through yt-dlp.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::EngineError;
use super::traits::ResolveEngine;
use super::types::{Resolution, ResourceCategory, ResourceItem};
use crate::identity::Identity;
use crate::lifecycle::{run_captured, CancelHandle, CommandSpec};
use crate::strategy::StrategyKind;

/// Format selector for the merged best-quality entry.
pub const BEST_FORMAT: &str = "bestvideo+bestaudio/best";

/// Runs `yt-dlp --dump-json` and turns the format list into items.
pub struct MediaExtractEngine {
    yt_dlp: PathBuf,
    probe_timeout: Duration,
    kill_grace: Duration,
}

impl MediaExtractEngine {
    pub fn new(yt_dlp: impl Into<PathBuf>, probe_timeout: Duration, kill_grace: Duration) -> Self {
        Self {
            yt_dlp: yt_dlp.into(),
            probe_timeout,
            kill_grace,
        }
    }

    pub fn command(&self, url: &str, identity: &Identity) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.yt_dlp).args(["--dump-json", "--no-warnings"]);
        if let Some(proxy) = &identity.proxy {
            spec = spec.args(["--proxy", proxy.as_str()]);
        }
        spec.args(["--user-agent", identity.user_agent.as_str()]).arg(url)
    }
}

#[async_trait]
impl ResolveEngine for MediaExtractEngine {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MediaExtract
    }

    async fn attempt(
        &self,
        url: &str,
        identity: &Identity,
        cancel: &CancelHandle,
    ) -> Result<Resolution, EngineError> {
        let spec = self.command(url, identity);
        debug!("Running {}", spec.display());
        let captured = run_captured(&spec, cancel, self.probe_timeout, self.kill_grace).await?;

        let Some(json_line) = captured.lines.iter().find(|l| l.trim_start().starts_with('{')) else {
            let reason = captured
                .lines
                .iter()
                .rev()
                .find(|l| !l.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| format!("exit code {:?}", captured.exit.code));
            warn!("yt-dlp produced no metadata for {}: {}", url, reason);
            return if captured.exit.success {
                Err(EngineError::NoResources)
            } else {
                Err(EngineError::Process(reason))
            };
        };

        let info: Value = serde_json::from_str(json_line.trim())
            .map_err(|e| EngineError::parse("yt-dlp metadata", e.to_string()))?;
        let resolution = parse_media_info(url, &info);
        if resolution.is_empty() {
            return Err(EngineError::NoResources);
        }
        Ok(resolution)
    }
}

/// Items for every downloadable format, preceded by the merged best entry.
pub fn parse_media_info(url: &str, info: &Value) -> Resolution {
    let title = info
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);

    let formats = info
        .get("formats")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut items = Vec::new();
    for format in &formats {
        let Some(format_id) = format.get("format_id").and_then(Value::as_str) else {
            continue;
        };
        let text = |key: &str| format.get(key).and_then(Value::as_str).map(str::to_string);
        let vcodec = text("vcodec");
        let acodec = text("acodec");
        let ext = text("ext").map(|e| e.to_ascii_lowercase());

        let has_video = vcodec.as_deref().is_some_and(|v| v != "none");
        let has_audio = acodec.as_deref().is_some_and(|a| a != "none");
        let category = if has_video {
            ResourceCategory::Video
        } else if has_audio {
            ResourceCategory::Audio
        } else if vcodec.is_none() && acodec.is_none() {
            ext.as_deref()
                .map(ResourceCategory::from_extension)
                .unwrap_or(ResourceCategory::Other)
        } else {
            // storyboards and other codec-less tracks
            continue;
        };

        let size = format
            .get("filesize")
            .and_then(Value::as_u64)
            .or_else(|| format.get("filesize_approx").and_then(Value::as_u64));
        let resolution = text("resolution").unwrap_or_else(|| {
            if has_video {
                "video".to_string()
            } else {
                "audio only".to_string()
            }
        });
        let note = format!(
            "{} | {} | {} / {}",
            text("format_note").unwrap_or_else(|| format_id.to_string()),
            resolution,
            vcodec.as_deref().unwrap_or("none"),
            acodec.as_deref().unwrap_or("none"),
        );

        items.push(
            ResourceItem::media(url, format_id, category)
                .with_ext(ext)
                .with_size(size)
                .with_note(note),
        );
    }

    if !items.is_empty() {
        let best = ResourceItem::media(url, BEST_FORMAT, ResourceCategory::Video)
            .with_ext(Some("mp4".to_string()))
            .with_note("best video + best audio (merged)");
        items.insert(0, best);
    } else if info.get("url").and_then(Value::as_str).is_some() {
        // single-format extractors put the stream at the top level
        let ext = info.get("ext").and_then(Value::as_str).map(str::to_ascii_lowercase);
        let category = ext
            .as_deref()
            .map(ResourceCategory::from_extension)
            .unwrap_or(ResourceCategory::Video);
        items.push(ResourceItem::media(url, "best", category).with_ext(ext));
    }

    Resolution::new(title, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Identity, TlsProfile};
    use serde_json::json;

    fn identity(proxy: Option<&str>) -> Identity {
        Identity {
            user_agent: "UA/1.0".to_string(),
            proxy: proxy.map(str::to_string),
            headers: Vec::new(),
            tls_profile: TlsProfile::Chrome120,
        }
    }

    #[test]
    fn test_command_args() {
        let engine = MediaExtractEngine::new("yt-dlp", Duration::from_secs(90), Duration::from_secs(3));
        let spec = engine.command("https://v.example/watch?v=1", &identity(Some("http://p:8080")));
        assert_eq!(
            spec.args,
            vec![
                "--dump-json",
                "--no-warnings",
                "--proxy",
                "http://p:8080",
                "--user-agent",
                "UA/1.0",
                "https://v.example/watch?v=1",
            ]
        );

        let spec = engine.command("https://v.example/1", &identity(None));
        assert!(!spec.args.iter().any(|a| a == "--proxy"));
    }

    #[test]
    fn test_parse_formats() {
        let info = json!({
            "title": "A clip",
            "formats": [
                {"format_id": "sb0", "ext": "mhtml", "vcodec": "none", "acodec": "none"},
                {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2",
                 "filesize": 3_000_000u64, "format_note": "medium"},
                {"format_id": "137", "ext": "MP4", "vcodec": "avc1.640028", "acodec": "none",
                 "resolution": "1920x1080", "filesize_approx": 90_000_000u64},
                {"ext": "mp4"}
            ]
        });

        let resolution = parse_media_info("https://v.example/1", &info);
        assert_eq!(resolution.title.as_deref(), Some("A clip"));
        let ids: Vec<&str> = resolution
            .items
            .iter()
            .filter_map(|i| i.format_id.as_deref())
            .collect();
        assert_eq!(ids, vec![BEST_FORMAT, "140", "137"]);

        let audio = &resolution.items[1];
        assert_eq!(audio.category, ResourceCategory::Audio);
        assert_eq!(audio.size, Some(3_000_000));
        assert!(audio.note.as_deref().unwrap().starts_with("medium | audio only"));

        let video = &resolution.items[2];
        assert_eq!(video.category, ResourceCategory::Video);
        assert_eq!(video.ext.as_deref(), Some("mp4"));
        assert_eq!(video.size, Some(90_000_000));
    }

    #[test]
    fn test_parse_single_stream() {
        let info = json!({"title": "Track", "url": "https://cdn/x.mp3", "ext": "mp3"});
        let resolution = parse_media_info("https://m.example/t/1", &info);
        assert_eq!(resolution.items.len(), 1);
        assert_eq!(resolution.items[0].format_id.as_deref(), Some("best"));
        assert_eq!(resolution.items[0].category, ResourceCategory::Audio);
    }

    #[test]
    fn test_parse_nothing() {
        assert!(parse_media_info("https://x", &json!({"title": "t"})).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_binary_is_configuration() {
        let engine = MediaExtractEngine::new(
            "/nonexistent/yt-dlp-for-tests",
            Duration::from_secs(5),
            Duration::from_secs(1),
        );
        let err = engine
            .attempt("https://v.example/1", &identity(None), &CancelHandle::new())
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
