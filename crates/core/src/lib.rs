pub mod config;
pub mod download;
pub mod engine;
pub mod experience;
pub mod fetch;
pub mod identity;
pub mod lifecycle;
pub mod metrics;
pub mod orchestrator;
pub mod strategy;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, ExperienceConfig, RobotsConfig,
};
pub use download::{
    build_downloaders, DirectDownloader, DownloadConfig, DownloadError, DownloadParams,
    DownloadProgress, DownloadReport, DownloadTask, Downloader, MediaDownloader,
};
pub use engine::{
    build_registry, BrowserRenderEngine, DirectLinkEngine, EngineConfig, EngineError,
    HtmlParseEngine, ItemKind, MediaExtractEngine, ReleaseApiEngine, Resolution,
    ResolveEngine, ResourceCategory, ResourceItem,
};
pub use experience::{ExperienceError, ExperienceStore};
pub use fetch::{
    create_engine, AttemptError, FetchConfig, FetchError, FetchEscalator, FetchRequest,
    FetchResponse, HttpEngine, RetryPolicy,
};
pub use identity::{Identity, IdentityBuilder, IdentityConfig, TlsProfile};
pub use lifecycle::{CancelHandle, Stoppable};
pub use orchestrator::{
    DownloadOutcome, EventReceiver, Orchestrator, OrchestratorConfig, OrchestratorError,
    OrchestratorEvent, OrchestratorState, QueueSummary, ResolutionResult, SniffFailure,
    TaskDescriptor,
};
pub use strategy::{EngineRegistry, ScoringConfig, StrategyKind, StrategyScorer};
