//! Generic resource link extraction from HTML.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use super::types::{extension_of, ResourceCategory, ResourceItem};

static RESOURCE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href], img[src], video[src], audio[src], source[src]").unwrap());

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

/// Text of the first `<title>` element, trimmed.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title = document
        .select(&TITLE_SELECTOR)
        .next()?
        .text()
        .collect::<String>();
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Resource links in `html`, resolved against `base_url`.
///
/// Anchors count when they point at a known file type or carry
/// `data-skip-pjax` (release asset links); `src` of media and image tags
/// always counts. Only links with a known category survive. Order of first
/// appearance is kept, duplicates dropped.
pub fn extract_links(base_url: &str, html: &str) -> Vec<ResourceItem> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for element in document.select(&RESOURCE_SELECTOR) {
        let tag = element.value();
        let link = if tag.name() == "a" {
            let Some(href) = tag.attr("href") else { continue };
            let skip_pjax = tag.attr("data-skip-pjax").is_some();
            let known = link_extension(&base, href)
                .map(|ext| ResourceCategory::from_extension(&ext) != ResourceCategory::Other)
                .unwrap_or(false);
            if !(skip_pjax || known) {
                continue;
            }
            href
        } else {
            let Some(src) = tag.attr("src") else { continue };
            src
        };

        let link = link.trim();
        if link.is_empty() || is_non_resource(link) {
            continue;
        }
        if let Ok(resolved) = base.join(link) {
            let resolved = resolved.to_string();
            if seen.insert(resolved.clone()) {
                candidates.push(resolved);
            }
        }
    }

    candidates
        .into_iter()
        .filter_map(|link| {
            let url = Url::parse(&link).ok()?;
            let segment = url.path_segments()?.next_back()?.to_string();
            let filename = urlencoding::decode(&segment)
                .map(|s| s.into_owned())
                .unwrap_or(segment);
            let ext = extension_of(&filename)?;
            if ResourceCategory::from_extension(&ext) == ResourceCategory::Other {
                return None;
            }
            Some(ResourceItem::direct(link, Some(filename)))
        })
        .collect()
}

fn link_extension(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href).ok()?;
    let segment = url.path_segments()?.next_back()?;
    extension_of(segment)
}

fn is_non_resource(link: &str) -> bool {
    let lower = link.to_ascii_lowercase();
    lower.starts_with("javascript:") || lower.starts_with('#') || lower.starts_with("data:")
}
