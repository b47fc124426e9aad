//! Fetch escalator configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which client implementation backs an engine entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpEngineKind {
    Reqwest,
    CurlImpersonate,
}

/// One HTTP engine available to the escalator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEngineConfig {
    /// Name used in `engine_order` and for the cookie file.
    pub name: String,
    pub kind: HttpEngineKind,
    /// Override whether cookies are cleared per domain before use.
    #[serde(default)]
    pub scoped_cookies: Option<bool>,
    /// Override whether edge-network blocks are worth retrying on this engine.
    #[serde(default)]
    pub bypasses_edge_block: Option<bool>,
    /// Directory holding the `curl_<profile>` wrapper scripts (curl-impersonate only).
    /// Falls back to `PATH` lookup.
    #[serde(default)]
    pub binary_dir: Option<PathBuf>,
}

/// Configuration for the fetch escalator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_engines")]
    pub engines: Vec<HttpEngineConfig>,
    /// Escalation order, by engine name.
    #[serde(default = "default_engine_order")]
    pub engine_order: Vec<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries_per_engine: u32,
    #[serde(default = "default_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_max_jitter_ms")]
    pub retry_max_jitter_ms: u64,
    /// Per-request timeout when the request does not set one.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Where per-engine cookie files live. No persistence when unset.
    #[serde(default)]
    pub cookie_dir: Option<PathBuf>,
}

fn default_engines() -> Vec<HttpEngineConfig> {
    vec![
        HttpEngineConfig {
            name: "reqwest".to_string(),
            kind: HttpEngineKind::Reqwest,
            scoped_cookies: None,
            bypasses_edge_block: None,
            binary_dir: None,
        },
        HttpEngineConfig {
            name: "curl-impersonate".to_string(),
            kind: HttpEngineKind::CurlImpersonate,
            scoped_cookies: None,
            bypasses_edge_block: None,
            binary_dir: None,
        },
    ]
}

fn default_engine_order() -> Vec<String> {
    vec!["reqwest".to_string(), "curl-impersonate".to_string()]
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_jitter_ms() -> u64 {
    1_000
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            engines: default_engines(),
            engine_order: default_engine_order(),
            max_retries_per_engine: default_max_retries(),
            retry_base_delay_ms: default_base_delay_ms(),
            retry_max_delay_ms: default_max_delay_ms(),
            retry_max_jitter_ms: default_max_jitter_ms(),
            request_timeout_secs: default_request_timeout(),
            cookie_dir: None,
        }
    }
}
