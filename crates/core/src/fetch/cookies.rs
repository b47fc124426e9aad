//! Per-engine cookie jar with domain clearing and JSON persistence.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    /// Host the cookie belongs to, without a leading dot.
    pub domain: String,
    /// Cookie was set with a `Domain` attribute and also matches subdomains.
    #[serde(default)]
    pub include_subdomains: bool,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

const MAX_COOKIE_AGE_SECS: i64 = 400 * 24 * 3600;

fn default_path() -> String {
    "/".to_string()
}

impl StoredCookie {
    fn matches_host(&self, host: &str) -> bool {
        host == self.domain || (self.include_subdomains && host.ends_with(&format!(".{}", self.domain)))
    }

    fn matches_path(&self, path: &str) -> bool {
        path.starts_with(&self.path)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.map(|e| e <= now).unwrap_or(false)
    }
}

/// Cookie store shared by all attempts of one engine.
///
/// Implements reqwest's [`CookieStore`] so it can be plugged into a fresh
/// client per attempt.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<StoredCookie>>,
    path: Option<PathBuf>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jar backed by `path`. A missing or unreadable file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cookies = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<StoredCookie>>(&content) {
                Ok(cookies) => {
                    info!("Loaded {} cookies from {:?}", cookies.len(), path);
                    cookies
                }
                Err(e) => {
                    warn!("Ignoring unreadable cookie file {:?}: {}", path, e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Failed to read cookie file {:?}: {}", path, e);
                Vec::new()
            }
        };
        Self {
            cookies: RwLock::new(cookies),
            path: Some(path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Store a cookie from a `Set-Cookie` header value received from `url`.
    pub fn insert_raw(&self, set_cookie: &str, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };
        let Some(cookie) = parse_set_cookie(set_cookie, host, Utc::now()) else {
            return;
        };
        let mut cookies = self.write();
        cookies.retain(|c| !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path));
        if !cookie.is_expired(Utc::now()) {
            cookies.push(cookie);
        }
    }

    /// `Cookie` header value for a request to `url`.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?;
        let now = Utc::now();
        let pairs: Vec<String> = self
            .read()
            .iter()
            .filter(|c| c.matches_host(host) && c.matches_path(url.path()) && !c.is_expired(now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Remove every cookie that would be sent to `host`. Returns how many went.
    pub fn clear_domain(&self, host: &str) -> usize {
        let mut cookies = self.write();
        let before = cookies.len();
        cookies.retain(|c| !c.matches_host(host));
        let removed = before - cookies.len();
        if removed > 0 {
            debug!("Cleared {} cookies for {}", removed, host);
        }
        removed
    }

    /// Write unexpired cookies to the backing file (temp file + rename).
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let now = Utc::now();
        let cookies: Vec<StoredCookie> = self
            .read()
            .iter()
            .filter(|c| !c.is_expired(now))
            .cloned()
            .collect();
        let json = serde_json::to_string_pretty(&cookies)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!("Saved {} cookies to {:?}", cookies.len(), path);
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<StoredCookie>> {
        self.cookies.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<StoredCookie>> {
        self.cookies.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        for header in cookie_headers {
            if let Ok(value) = header.to_str() {
                self.insert_raw(value, url);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.header_for(url)
            .and_then(|value| HeaderValue::from_str(&value).ok())
    }
}

/// Parse one `Set-Cookie` value. Unknown attributes are ignored.
pub fn parse_set_cookie(raw: &str, host: &str, now: DateTime<Utc>) -> Option<StoredCookie> {
    let mut parts = raw.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = StoredCookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        domain: host.to_ascii_lowercase(),
        include_subdomains: false,
        path: default_path(),
        expires: None,
    };

    let mut max_age = None;
    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => {
                let domain = val.trim_start_matches('.').to_ascii_lowercase();
                // a server may only widen a cookie to a parent of its own host
                if host == domain || host.ends_with(&format!(".{}", domain)) {
                    cookie.domain = domain;
                    cookie.include_subdomains = true;
                }
            }
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "max-age" => max_age = val.parse::<i64>().ok(),
            "expires" => {
                if let Ok(at) = DateTime::parse_from_rfc2822(val) {
                    cookie.expires = Some(at.with_timezone(&Utc));
                }
            }
            _ => {}
        }
    }

    // Max-Age wins over Expires
    if let Some(secs) = max_age {
        let secs = secs.clamp(-1, MAX_COOKIE_AGE_SECS);
        cookie.expires = Some(now + ChronoDuration::seconds(secs));
    }

    Some(cookie)
}
