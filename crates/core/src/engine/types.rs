//! Types shared by the resolve engines.

use serde::{Deserialize, Serialize};

/// Coarse resource category, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Video,
    Audio,
    Image,
    Archive,
    Executable,
    Document,
    Other,
}

const VIDEO: &[&str] = &["mp4", "mkv", "avi", "mov", "flv", "webm", "ts", "m3u8"];
const AUDIO: &[&str] = &["mp3", "m4a", "wav", "aac", "flac", "ogg"];
const IMAGE: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"];
const ARCHIVE: &[&str] = &["zip", "rar", "7z", "tar", "gz", "iso"];
const EXECUTABLE: &[&str] = &["exe", "msi", "dmg", "pkg", "deb", "rpm"];
const DOCUMENT: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "md"];

impl ResourceCategory {
    /// Category for an extension, with or without the leading dot.
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let table: [(&[&str], ResourceCategory); 6] = [
            (VIDEO, ResourceCategory::Video),
            (AUDIO, ResourceCategory::Audio),
            (IMAGE, ResourceCategory::Image),
            (ARCHIVE, ResourceCategory::Archive),
            (EXECUTABLE, ResourceCategory::Executable),
            (DOCUMENT, ResourceCategory::Document),
        ];
        table
            .iter()
            .find(|(exts, _)| exts.contains(&ext.as_str()))
            .map(|(_, category)| *category)
            .unwrap_or(ResourceCategory::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Video => "video",
            ResourceCategory::Audio => "audio",
            ResourceCategory::Image => "image",
            ResourceCategory::Archive => "archive",
            ResourceCategory::Executable => "executable",
            ResourceCategory::Document => "document",
            ResourceCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a resource is downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Plain HTTP GET of `url`.
    Direct,
    /// Media extraction of `url` with `format_id`.
    MediaFormat,
}

/// One downloadable thing found behind a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceItem {
    pub kind: ItemKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Lowercase, without the dot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    pub category: ResourceCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Free-form description (resolution, codecs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ResourceItem {
    /// A direct link, categorized by the extension of `filename` if given.
    pub fn direct(url: impl Into<String>, filename: Option<String>) -> Self {
        let ext = filename.as_deref().and_then(extension_of);
        Self {
            kind: ItemKind::Direct,
            url: url.into(),
            format_id: None,
            category: ext
                .as_deref()
                .map(ResourceCategory::from_extension)
                .unwrap_or(ResourceCategory::Other),
            filename,
            ext,
            size: None,
            mime: None,
            note: None,
        }
    }

    /// A media format to be fetched by extraction.
    pub fn media(url: impl Into<String>, format_id: impl Into<String>, category: ResourceCategory) -> Self {
        Self {
            kind: ItemKind::MediaFormat,
            url: url.into(),
            format_id: Some(format_id.into()),
            filename: None,
            ext: None,
            category,
            size: None,
            mime: None,
            note: None,
        }
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_mime(mut self, mime: Option<String>) -> Self {
        self.mime = mime;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_ext(mut self, ext: Option<String>) -> Self {
        self.ext = ext;
        self
    }

    /// Short label for logs and events.
    pub fn label(&self) -> String {
        match (&self.filename, &self.format_id) {
            (Some(name), _) => name.clone(),
            (None, Some(format)) => format!("{} [{}]", self.url, format),
            (None, None) => self.url.clone(),
        }
    }
}

/// Lowercase extension of a file name, without the dot.
pub fn extension_of(name: &str) -> Option<String> {
    let trimmed = name.trim_start_matches('.');
    let idx = trimmed.rfind('.')?;
    let ext = &trimmed[idx + 1..];
    if ext.is_empty() || ext.contains('/') {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// What a successful strategy found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub title: Option<String>,
    pub items: Vec<ResourceItem>,
}

impl Resolution {
    pub fn new(title: Option<String>, items: Vec<ResourceItem>) -> Self {
        Self { title, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(ResourceCategory::from_extension(".MP4"), ResourceCategory::Video);
        assert_eq!(ResourceCategory::from_extension("flac"), ResourceCategory::Audio);
        assert_eq!(ResourceCategory::from_extension("svg"), ResourceCategory::Image);
        assert_eq!(ResourceCategory::from_extension("7z"), ResourceCategory::Archive);
        assert_eq!(ResourceCategory::from_extension("deb"), ResourceCategory::Executable);
        assert_eq!(ResourceCategory::from_extension("md"), ResourceCategory::Document);
        assert_eq!(ResourceCategory::from_extension("xyz"), ResourceCategory::Other);
    }

    #[test]
    fn test_direct_item() {
        let item = ResourceItem::direct("https://e.com/tool-1.2.tar.gz", Some("tool-1.2.tar.gz".to_string()));
        assert_eq!(item.ext.as_deref(), Some("gz"));
        assert_eq!(item.category, ResourceCategory::Archive);
        assert_eq!(item.label(), "tool-1.2.tar.gz");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.PDF").as_deref(), Some("pdf"));
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(extension_of("noext"), None);
    }

    #[test]
    fn test_media_item_label() {
        let item = ResourceItem::media("https://v.com/1", "137", ResourceCategory::Video);
        assert_eq!(item.label(), "https://v.com/1 [137]");
        assert_eq!(item.kind, ItemKind::MediaFormat);
    }
}
