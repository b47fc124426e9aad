//! Multi-engine HTTP fetch escalation.
//!
//! A [`FetchEscalator`] tries its [`HttpEngine`]s in order. Each attempt gets
//! a fresh identity; an engine gets up to `max_retries_per_engine` attempts
//! with exponential backoff before the next engine is tried. CAPTCHA pages
//! abort the whole fetch; edge-network blocks skip ahead to the next engine
//! unless the current one can get past them.

mod block;
mod client;
mod config;
mod cookies;
mod curl_engine;
mod escalator;
mod reqwest_engine;
mod retry;
mod robots;
mod types;

pub use block::{is_captcha, is_edge_block, is_proxy_rejection};
pub use client::{EngineCapabilities, HttpEngine};
pub use config::{FetchConfig, HttpEngineConfig, HttpEngineKind};
pub use cookies::{parse_set_cookie, CookieJar, StoredCookie};
pub use curl_engine::{parse_curl_output, CurlImpersonateEngine};
pub use escalator::{create_engine, FetchEscalator};
pub use reqwest::Method;
pub use reqwest_engine::ReqwestEngine;
pub use retry::RetryPolicy;
pub use robots::{origin_of, RobotsCache, RobotsRules};
pub use types::{AttemptError, FetchError, FetchRequest, FetchResponse};
