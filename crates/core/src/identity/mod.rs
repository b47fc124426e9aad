//! Ephemeral fetch identities.
//!
//! Every fetch attempt gets its own [`Identity`]: a user agent, an optional
//! proxy, a header set that is plausible for that user agent, and a TLS
//! impersonation profile for engines that can use one. Identities are never
//! reused across attempts.

mod builder;
mod config;
mod headers;
mod proxy;
mod types;
mod user_agent;

pub use builder::IdentityBuilder;
pub use config::IdentityConfig;
pub use headers::{consistent_headers, detect_platform, extract_chrome_version, Platform};
pub use proxy::ProxyPool;
pub use types::{Identity, IdentityError, TlsProfile};
pub use user_agent::{CatalogUserAgents, UserAgentSource, FALLBACK_USER_AGENTS};
