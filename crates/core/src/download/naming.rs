//! File names for downloaded resources.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'[^']*')?"?([^";]+)"?"#).unwrap()
});

/// File name from a `Content-Disposition` header.
///
/// `filename*=UTF-8''...` values are percent-decoded and preferred over a
/// plain `filename=`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for caps in FILENAME_RE.captures_iter(header) {
        let whole = caps.get(0)?.as_str();
        let raw = caps.get(1)?.as_str().trim();
        if raw.is_empty() {
            continue;
        }
        let extended = whole
            .split('=')
            .next()
            .map(|k| k.trim_end().ends_with('*'))
            .unwrap_or(false);
        let decoded = urlencoding::decode(raw)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        let name = sanitize_filename(&decoded);
        if name.is_empty() {
            continue;
        }
        if extended {
            return Some(name);
        }
        plain.get_or_insert(name);
    }
    plain
}

/// Last path segment of a URL, percent-decoded.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let name = sanitize_filename(&decoded);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Fallback name when neither header nor URL give one.
pub fn timestamped_filename() -> String {
    format!("download_{}", chrono::Utc::now().timestamp())
}

/// Strip path separators and characters most filesystems reject.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    trimmed.to_string()
}
