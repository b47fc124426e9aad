//! Strategy selection.
//!
//! [`StrategyScorer::select`] turns a URL into an ordered queue of
//! [`StrategyKind`]s: a fixed rule table first, then weighted scoring of base
//! suitability, cost and learned per-domain experience. The
//! [`EngineRegistry`] maps each kind to the engine that runs it.

mod config;
mod registry;
mod scorer;
mod types;

pub use config::ScoringConfig;
pub use registry::{EngineRegistry, UnknownStrategy};
pub use scorer::{path_extension, StrategyScorer, BINARY_EXTENSIONS};
pub use types::{ScoredStrategy, StrategyDescriptor, StrategyKind};
