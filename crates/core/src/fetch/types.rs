//! Fetch request, response and error types.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// A request handed to the escalator.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    /// Extra headers; these override the identity's defaults.
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub json: Option<serde_json::Value>,
    pub form: Option<Vec<(String, String)>>,
    /// Falls back to the configured request timeout.
    pub timeout: Option<Duration>,
    /// Start escalation at this engine instead of the first one.
    pub start_engine: Option<String>,
    /// Skip the robots.txt gate.
    pub ignore_robots: bool,
    /// Becomes the `Referer` of the generated identity.
    pub previous_url: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::HEAD, url)
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            query: Vec::new(),
            json: None,
            form: None,
            timeout: None,
            start_engine: None,
            ignore_robots: false,
            previous_url: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.form = Some(fields);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn start_engine(mut self, engine: impl Into<String>) -> Self {
        self.start_engine = Some(engine.into());
        self
    }

    pub fn ignore_robots(mut self, ignore: bool) -> Self {
        self.ignore_robots = ignore;
        self
    }

    pub fn previous_url(mut self, url: impl Into<String>) -> Self {
        self.previous_url = Some(url.into());
        self
    }

    /// The URL with `query` appended.
    pub fn full_url(&self) -> Result<url::Url, FetchError> {
        let mut url =
            url::Url::parse(&self.url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", self.url, e)))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in &self.query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }
}

/// A buffered HTTP response from one engine.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Name of the engine that produced it.
    pub engine: String,
    pub status: u16,
    pub final_url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl FetchResponse {
    /// Case-insensitive header lookup (first match).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")?.trim().parse().ok()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Transport failure of a single attempt. HTTP statuses are not errors here.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    /// The engine itself cannot run (missing binary, bad proxy URL).
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Errors from a whole escalated fetch.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("fetch cancelled")]
    Cancelled,

    #[error("disallowed by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    #[error("CAPTCHA detected by {engine} at {url}")]
    CaptchaDetected { engine: String, url: String },

    #[error("all engines failed ({}): {last_error}", engines.join(", "))]
    Exhausted {
        engines: Vec<String>,
        last_error: String,
    },

    #[error("no HTTP engines configured")]
    NoEngines,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("engine configuration error: {0}")]
    Configuration(String),
}

impl FetchError {
    /// Whether another strategy could still succeed after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::NoEngines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = FetchRequest::get("https://example.com/a")
            .header("X-Test", "1")
            .query("page", "2")
            .start_engine("curl-impersonate")
            .ignore_robots(true)
            .timeout(Duration::from_secs(5));

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.start_engine.as_deref(), Some("curl-impersonate"));
        assert!(request.ignore_robots);
        assert_eq!(
            request.full_url().unwrap().as_str(),
            "https://example.com/a?page=2"
        );
    }

    #[test]
    fn test_full_url_rejects_garbage() {
        let request = FetchRequest::get("not a url");
        assert!(matches!(request.full_url(), Err(FetchError::InvalidUrl(_))));
    }

    #[test]
    fn test_response_helpers() {
        let response = FetchResponse {
            engine: "reqwest".to_string(),
            status: 200,
            final_url: "https://example.com/".to_string(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Content-Length".to_string(), "12".to_string()),
            ],
            body: r#"{"ok": true}"#.to_string(),
        };
        assert!(response.is_success());
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.content_length(), Some(12));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_exhausted_message_lists_engines() {
        let err = FetchError::Exhausted {
            engines: vec!["reqwest".to_string(), "curl-impersonate".to_string()],
            last_error: "HTTP 503".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "all engines failed (reqwest, curl-impersonate): HTTP 503"
        );
    }
}
