//! TLS-impersonating engine backed by curl-impersonate wrapper scripts.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::client::{EngineCapabilities, HttpEngine};
use super::types::{AttemptError, FetchRequest, FetchResponse};
use crate::identity::Identity;

const URL_MARKER: &str = "\n__linkscout_final_url__:";

/// curl exit code for `--max-time` expiry.
const CURL_TIMED_OUT: i32 = 28;

/// Runs `curl_<profile>` (for example `curl_chrome120`) picked from the
/// identity's TLS profile.
///
/// Cookies are kept by curl itself in a Netscape cookie file, so they are
/// never scoped per domain.
pub struct CurlImpersonateEngine {
    name: String,
    binary_dir: Option<PathBuf>,
    cookie_file: Option<PathBuf>,
    capabilities: EngineCapabilities,
    default_timeout: Duration,
}

impl CurlImpersonateEngine {
    pub fn new(name: impl Into<String>, binary_dir: Option<PathBuf>, default_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            binary_dir,
            cookie_file: None,
            capabilities: EngineCapabilities {
                scoped_cookies: false,
                bypasses_edge_block: true,
            },
            default_timeout,
        }
    }

    /// Keep cookies in `<cookie_dir>/cookies_<name>.txt`.
    pub fn with_cookie_dir(mut self, cookie_dir: &Path) -> Self {
        self.cookie_file = Some(cookie_dir.join(format!("cookies_{}.txt", self.name)));
        self
    }

    pub fn with_capabilities(mut self, capabilities: EngineCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Wrapper binary for the identity's profile.
    pub fn binary_for(&self, identity: &Identity) -> PathBuf {
        let profile = identity.tls_profile.concrete(&mut rand::thread_rng());
        let file = format!("curl_{}", profile.as_str());
        match &self.binary_dir {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }

    /// Command-line arguments for one attempt.
    pub fn build_args(
        &self,
        request: &FetchRequest,
        identity: &Identity,
        url: &str,
        time_budget: Duration,
    ) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            "-S".to_string(),
            "-L".to_string(),
            "-i".to_string(),
            "--compressed".to_string(),
            "--max-time".to_string(),
            time_budget.as_secs().max(1).to_string(),
            "-w".to_string(),
            format!("{}%{{url_effective}}", URL_MARKER),
        ];

        if request.method == reqwest::Method::HEAD {
            args.push("-I".to_string());
        } else {
            args.push("-X".to_string());
            args.push(request.method.as_str().to_string());
        }

        for (name, value) in &identity.headers {
            // curl negotiates encoding itself with --compressed
            if name.eq_ignore_ascii_case("accept-encoding") {
                continue;
            }
            args.push("-H".to_string());
            args.push(format!("{}: {}", name, value));
        }

        if let Some(proxy) = &identity.proxy {
            args.push("-x".to_string());
            args.push(proxy.clone());
        }

        if let Some(json) = &request.json {
            args.push("-H".to_string());
            args.push("Content-Type: application/json".to_string());
            args.push("--data-raw".to_string());
            args.push(json.to_string());
        } else if let Some(form) = &request.form {
            for (k, v) in form {
                args.push("--data-urlencode".to_string());
                args.push(format!("{}={}", k, v));
            }
        }

        if let Some(cookie_file) = &self.cookie_file {
            let path = cookie_file.to_string_lossy().to_string();
            args.push("-b".to_string());
            args.push(path.clone());
            args.push("-c".to_string());
            args.push(path);
        }

        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl HttpEngine for CurlImpersonateEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn clear_domain_cookies(&self, _host: &str) {}

    async fn execute(
        &self,
        request: &FetchRequest,
        identity: &Identity,
    ) -> Result<FetchResponse, AttemptError> {
        let url = request
            .full_url()
            .map_err(|e| AttemptError::Transport(e.to_string()))?
            .to_string();
        let time_budget = request.timeout.unwrap_or(self.default_timeout);
        let binary = self.binary_for(identity);
        let args = self.build_args(request, identity, &url, time_budget);

        if let Some(parent) = self.cookie_file.as_ref().and_then(|p| p.parent()) {
            let _ = tokio::fs::create_dir_all(parent).await;
        }

        debug!(engine = %self.name, binary = %binary.display(), %url, "Running curl-impersonate");

        let child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    AttemptError::Unavailable(format!("{} not found", binary.display()))
                } else {
                    AttemptError::Unavailable(format!("failed to run {}: {}", binary.display(), e))
                }
            })?;

        // curl enforces --max-time; the outer bound only catches a hung wrapper
        let output = timeout(time_budget + Duration::from_secs(5), child.wait_with_output())
            .await
            .map_err(|_| AttemptError::Timeout)?
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        if !output.status.success() {
            if output.status.code() == Some(CURL_TIMED_OUT) {
                return Err(AttemptError::Timeout);
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AttemptError::Transport(format!(
                "curl exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        parse_curl_output(&self.name, &output.stdout, &url)
    }

    fn persist_cookies(&self) {}
}

/// Split `curl -i -L -w` output into the final header block, body and URL.
pub fn parse_curl_output(
    engine: &str,
    stdout: &[u8],
    requested_url: &str,
) -> Result<FetchResponse, AttemptError> {
    let text = String::from_utf8_lossy(stdout);
    let (payload, final_url) = match text.rfind(URL_MARKER) {
        Some(idx) => (
            &text[..idx],
            text[idx + URL_MARKER.len()..].trim().to_string(),
        ),
        None => (text.as_ref(), requested_url.to_string()),
    };

    // with -L every hop (and a proxy CONNECT) prints its own header block
    let mut rest = payload;
    let mut last_block: Option<&str> = None;
    while rest.starts_with("HTTP/") {
        let (block, after) = match rest.find("\r\n\r\n") {
            Some(i) => (&rest[..i], &rest[i + 4..]),
            None => match rest.find("\n\n") {
                Some(i) => (&rest[..i], &rest[i + 2..]),
                None => (rest, ""),
            },
        };
        last_block = Some(block);
        rest = after;
    }

    let block = last_block
        .ok_or_else(|| AttemptError::Transport("curl output has no HTTP status line".to_string()))?;
    let mut lines = block.lines();
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| AttemptError::Transport(format!("bad status line: {}", status_line)))?;

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    Ok(FetchResponse {
        engine: engine.to_string(),
        status,
        final_url: if final_url.is_empty() {
            requested_url.to_string()
        } else {
            final_url
        },
        headers,
        body: rest.to_string(),
    })
}
