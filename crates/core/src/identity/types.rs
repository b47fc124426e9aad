//! Identity types.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building an identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The user agent source could not produce a value.
    #[error("user agent source unavailable: {0}")]
    UserAgentUnavailable(String),

    /// The proxy file could not be read.
    #[error("failed to read proxy file: {0}")]
    ProxyFile(#[from] std::io::Error),
}

/// TLS fingerprint profile for engines able to impersonate a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsProfile {
    Chrome110,
    Chrome116,
    Chrome120,
    #[serde(rename = "safari15_5")]
    Safari15_5,
    Firefox115,
    Random,
}

impl TlsProfile {
    pub const ALL: [TlsProfile; 6] = [
        TlsProfile::Chrome110,
        TlsProfile::Chrome116,
        TlsProfile::Chrome120,
        TlsProfile::Safari15_5,
        TlsProfile::Firefox115,
        TlsProfile::Random,
    ];

    /// Profile name as understood by curl-impersonate wrappers.
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsProfile::Chrome110 => "chrome110",
            TlsProfile::Chrome116 => "chrome116",
            TlsProfile::Chrome120 => "chrome120",
            TlsProfile::Safari15_5 => "safari15_5",
            TlsProfile::Firefox115 => "firefox115",
            TlsProfile::Random => "random",
        }
    }

    /// Pick a profile uniformly at random.
    pub fn pick<R: Rng + ?Sized>(rng: &mut R) -> Self {
        *Self::ALL.choose(rng).unwrap_or(&TlsProfile::Chrome120)
    }

    /// Resolve `Random` into a concrete profile.
    pub fn concrete<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        match self {
            TlsProfile::Random => *Self::ALL[..5].choose(rng).unwrap_or(&TlsProfile::Chrome120),
            other => other,
        }
    }
}

impl std::fmt::Display for TlsProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ephemeral network fingerprint, used for exactly one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_agent: String,
    pub proxy: Option<String>,
    /// Headers in the order they should be sent.
    pub headers: Vec<(String, String)>,
    pub tls_profile: TlsProfile,
}

impl Identity {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Short description for logs (UA tail and proxy).
    pub fn describe(&self) -> String {
        let tail: String = {
            let chars: Vec<char> = self.user_agent.chars().collect();
            let start = chars.len().saturating_sub(30);
            chars[start..].iter().collect()
        };
        format!(
            "UA ...{}, proxy {}",
            tail,
            self.proxy.as_deref().unwrap_or("none")
        )
    }
}
