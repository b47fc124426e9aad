//! Scoring configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{StrategyDescriptor, StrategyKind};

/// Constants of the weighted scoring formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Strategies must score strictly above this to be queued.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Success counts above this add no further bonus.
    #[serde(default = "default_experience_cap")]
    pub experience_cap: u32,
    /// Bonus per recorded success.
    #[serde(default = "default_experience_weight")]
    pub experience_weight: f64,
    /// `penalty = (cost_ceiling - cost) / 10`
    #[serde(default = "default_cost_ceiling")]
    pub cost_ceiling: u8,
    /// Per-strategy cost overrides.
    #[serde(default)]
    pub costs: BTreeMap<StrategyKind, u8>,
}

fn default_threshold() -> f64 {
    20.0
}

fn default_experience_cap() -> u32 {
    10
}

fn default_experience_weight() -> f64 {
    5.0
}

fn default_cost_ceiling() -> u8 {
    11
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            experience_cap: default_experience_cap(),
            experience_weight: default_experience_weight(),
            cost_ceiling: default_cost_ceiling(),
            costs: BTreeMap::new(),
        }
    }
}

impl ScoringConfig {
    /// Effective descriptors (defaults plus overrides) in scoring order.
    pub fn descriptors(&self) -> Vec<StrategyDescriptor> {
        StrategyKind::SCORING_ORDER
            .iter()
            .map(|&kind| StrategyDescriptor {
                kind,
                cost: self.costs.get(&kind).copied().unwrap_or_else(|| kind.default_cost()),
            })
            .collect()
    }
}
