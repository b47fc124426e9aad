//! Strategy identifiers and scoring results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A way of detecting downloadable resources behind a URL.
///
/// The serialized names are the keys of the experience file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    DirectLinkCheck,
    ReleaseApi,
    MediaExtract,
    HtmlParse,
    BrowserRender,
}

impl StrategyKind {
    /// Declaration order used to break score ties.
    pub const SCORING_ORDER: [StrategyKind; 5] = [
        StrategyKind::MediaExtract,
        StrategyKind::BrowserRender,
        StrategyKind::HtmlParse,
        StrategyKind::DirectLinkCheck,
        StrategyKind::ReleaseApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::DirectLinkCheck => "direct_link_check",
            StrategyKind::ReleaseApi => "release_api",
            StrategyKind::MediaExtract => "media_extract",
            StrategyKind::HtmlParse => "html_parse",
            StrategyKind::BrowserRender => "browser_render",
        }
    }

    /// Default relative cost in `[1, 10]`.
    pub fn default_cost(&self) -> u8 {
        match self {
            StrategyKind::DirectLinkCheck => 2,
            StrategyKind::ReleaseApi => 2,
            StrategyKind::MediaExtract => 5,
            StrategyKind::HtmlParse => 3,
            StrategyKind::BrowserRender => 10,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::SCORING_ORDER
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown strategy '{}'", s))
    }
}

/// A strategy with its cost, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub kind: StrategyKind,
    pub cost: u8,
}

/// One row of the scoring table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredStrategy {
    pub kind: StrategyKind,
    pub base: f64,
    /// `(cost_ceiling - cost) / 10`
    pub penalty: f64,
    pub experience_bonus: f64,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for kind in StrategyKind::SCORING_ORDER {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!("yt_dlp".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&StrategyKind::ReleaseApi).unwrap();
        assert_eq!(json, r#""release_api""#);
        let kind: StrategyKind = serde_json::from_str(r#""browser_render""#).unwrap();
        assert_eq!(kind, StrategyKind::BrowserRender);
    }
}
