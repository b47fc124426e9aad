//! Rule table and weighted scoring for strategy selection.

use std::sync::Arc;

use tracing::{debug, info};
use url::Url;

use super::config::ScoringConfig;
use super::types::{ScoredStrategy, StrategyDescriptor, StrategyKind};
use crate::experience::{normalize_domain, ExperienceStore};

/// Extensions that mark a URL as a direct file link.
pub const BINARY_EXTENSIONS: &[&str] = &[
    ".mp4", ".mkv", ".zip", ".rar", ".exe", ".msi", ".pdf", ".mp3", ".iso", ".dmg", ".pkg",
];

/// Media sites where extraction is likely to work.
const MEDIA_FRIENDLY_SITES: &[&str] = &["vimeo.com", "douyin.com", "ixigua.com"];

/// Picks an ordered strategy queue for a URL.
pub struct StrategyScorer {
    config: ScoringConfig,
    descriptors: Vec<StrategyDescriptor>,
    experience: Arc<ExperienceStore>,
}

impl StrategyScorer {
    pub fn new(config: ScoringConfig, experience: Arc<ExperienceStore>) -> Self {
        let descriptors = config.descriptors();
        Self {
            config,
            descriptors,
            experience,
        }
    }

    pub fn descriptors(&self) -> &[StrategyDescriptor] {
        &self.descriptors
    }

    pub fn experience(&self) -> &Arc<ExperienceStore> {
        &self.experience
    }

    /// Ordered strategy queue for `url`. Empty when nothing qualifies or the
    /// URL does not parse.
    pub fn select(&self, url: &str) -> Vec<StrategyKind> {
        let Some((domain, path)) = split_url(url) else {
            debug!("Cannot parse {}, no strategies", url);
            return Vec::new();
        };

        if let Some(queue) = rule_match(&domain, &path) {
            info!("Rule match for {}: {}", url, join(&queue));
            return queue;
        }

        let scored = self.score_parts(&domain, &path);
        info!(
            "Scores for {}: {}",
            url,
            scored
                .iter()
                .map(|s| format!("{}={:.2}", s.kind, s.score))
                .collect::<Vec<_>>()
                .join(", ")
        );
        scored
            .into_iter()
            .filter(|s| s.score > self.config.threshold)
            .map(|s| s.kind)
            .collect()
    }

    /// Full scoring table for `url`, sorted by score, without rules or threshold.
    pub fn score(&self, url: &str) -> Vec<ScoredStrategy> {
        match split_url(url) {
            Some((domain, path)) => self.score_parts(&domain, &path),
            None => Vec::new(),
        }
    }

    /// Queue that the rule table alone would produce.
    pub fn rule_for(&self, url: &str) -> Option<Vec<StrategyKind>> {
        let (domain, path) = split_url(url)?;
        rule_match(&domain, &path)
    }

    fn score_parts(&self, domain: &str, path: &str) -> Vec<ScoredStrategy> {
        let mut scored: Vec<ScoredStrategy> = self
            .descriptors
            .iter()
            .map(|d| {
                let base = base_score(d.kind, domain, path);
                let factor = i32::from(self.config.cost_ceiling) - i32::from(d.cost);
                let penalty = f64::from(factor) / 10.0;
                let count = self
                    .experience
                    .success_count(domain, d.kind)
                    .min(self.config.experience_cap);
                let experience_bonus = f64::from(count) * self.config.experience_weight;
                ScoredStrategy {
                    kind: d.kind,
                    base,
                    penalty,
                    experience_bonus,
                    score: base * f64::from(factor) / 10.0 + experience_bonus,
                }
            })
            .collect();
        // stable sort: ties keep declaration order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }
}

fn split_url(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some((normalize_domain(host), parsed.path().to_string()))
}

fn rule_match(domain: &str, path: &str) -> Option<Vec<StrategyKind>> {
    let lower_path = path.to_ascii_lowercase();

    if domain.contains("github.com") && path.contains("/releases") {
        return Some(vec![
            StrategyKind::ReleaseApi,
            StrategyKind::BrowserRender,
            StrategyKind::HtmlParse,
        ]);
    }
    if BINARY_EXTENSIONS.iter().any(|ext| lower_path.ends_with(ext)) {
        return Some(vec![StrategyKind::DirectLinkCheck, StrategyKind::MediaExtract]);
    }
    if domain.contains("youtube.com") && (path.contains("/watch") || path.contains("/shorts/")) {
        return Some(vec![StrategyKind::MediaExtract]);
    }
    if domain.contains("bilibili.com") && path.contains("/video/") {
        return Some(vec![StrategyKind::MediaExtract]);
    }
    None
}

fn base_score(kind: StrategyKind, domain: &str, path: &str) -> f64 {
    match kind {
        StrategyKind::MediaExtract => {
            if MEDIA_FRIENDLY_SITES.iter().any(|site| domain.contains(site)) {
                70.0
            } else {
                40.0
            }
        }
        StrategyKind::BrowserRender => {
            if path_extension(path).is_none() {
                50.0
            } else {
                20.0
            }
        }
        StrategyKind::HtmlParse => 30.0,
        StrategyKind::DirectLinkCheck => 25.0,
        StrategyKind::ReleaseApi => 10.0,
    }
}

/// Extension of the last path segment, ignoring leading dots. A trailing
/// dot counts as an empty extension.
pub fn path_extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next().unwrap_or("");
    let trimmed = segment.trim_start_matches('.');
    let idx = trimmed.rfind('.')?;
    Some(&trimmed[idx + 1..])
}

fn join(queue: &[StrategyKind]) -> String {
    queue
        .iter()
        .map(StrategyKind::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
