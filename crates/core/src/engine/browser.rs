//! Headless browser rendering for script-built pages.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::error::EngineError;
use super::links::{extract_links, extract_title};
use super::traits::ResolveEngine;
use super::types::Resolution;
use crate::identity::Identity;
use crate::lifecycle::{run_captured, CancelHandle, CommandSpec};
use crate::strategy::StrategyKind;

/// Renders the page in headless Chromium and scans the final DOM.
///
/// The browser process is the session: it is registered with the task's
/// cancel handle for as long as it runs.
pub struct BrowserRenderEngine {
    browser: PathBuf,
    wait: Duration,
    timeout: Duration,
    kill_grace: Duration,
}

impl BrowserRenderEngine {
    pub fn new(browser: impl Into<PathBuf>, wait: Duration, timeout: Duration, kill_grace: Duration) -> Self {
        Self {
            browser: browser.into(),
            wait,
            timeout,
            kill_grace,
        }
    }

    pub fn command(&self, url: &str, identity: &Identity) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.browser).args([
            "--headless=new".to_string(),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--mute-audio".to_string(),
            format!("--virtual-time-budget={}", self.wait.as_millis()),
            format!("--user-agent={}", identity.user_agent),
        ]);
        if let Some(proxy) = &identity.proxy {
            spec = spec.arg(format!("--proxy-server={}", proxy));
        }
        spec.args(["--dump-dom", url])
    }
}

#[async_trait]
impl ResolveEngine for BrowserRenderEngine {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BrowserRender
    }

    async fn attempt(
        &self,
        url: &str,
        identity: &Identity,
        cancel: &CancelHandle,
    ) -> Result<Resolution, EngineError> {
        let spec = self.command(url, identity);
        debug!("Rendering {} with {}", url, self.browser.display());
        let captured = run_captured(&spec, cancel, self.timeout, self.kill_grace).await?;

        let dom = captured.lines.join("\n");
        if !captured.exit.success && !dom.contains('<') {
            warn!("Browser exited with {:?} for {}", captured.exit.code, url);
            return Err(EngineError::Process(format!(
                "browser exited with code {:?}",
                captured.exit.code
            )));
        }

        let items = extract_links(url, &dom);
        debug!("Rendered DOM of {} has {} links", url, items.len());
        if items.is_empty() {
            return Err(EngineError::NoResources);
        }
        Ok(Resolution::new(extract_title(&dom), items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::TlsProfile;

    fn identity() -> Identity {
        Identity {
            user_agent: "UA/2.0".to_string(),
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            headers: Vec::new(),
            tls_profile: TlsProfile::Firefox115,
        }
    }

    #[test]
    fn test_command_args() {
        let engine = BrowserRenderEngine::new(
            "chromium",
            Duration::from_secs(7),
            Duration::from_secs(60),
            Duration::from_secs(3),
        );
        let spec = engine.command("https://spa.example/app", &identity());
        assert!(spec.args.contains(&"--virtual-time-budget=7000".to_string()));
        assert!(spec.args.contains(&"--user-agent=UA/2.0".to_string()));
        assert!(spec.args.contains(&"--proxy-server=socks5://127.0.0.1:1080".to_string()));
        assert_eq!(spec.args[spec.args.len() - 2], "--dump-dom");
        assert_eq!(spec.args.last().map(String::as_str), Some("https://spa.example/app"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extracts_from_dumped_dom() {
        // `sh -c <script> <args...>`: the script ignores the browser flags
        let engine = BrowserRenderEngine::new(
            "sh",
            Duration::from_secs(1),
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        let mut spec = engine.command("https://spa.example/app", &identity());
        spec.args.insert(0, "-c".to_string());
        spec.args.insert(
            1,
            "echo '<html><title>App</title><a href=\"/f/a.zip\">a</a></html>'".to_string(),
        );
        let captured = run_captured(&spec, &CancelHandle::new(), Duration::from_secs(10), Duration::from_secs(1))
            .await
            .unwrap();
        let dom = captured.lines.join("\n");
        let items = extract_links("https://spa.example/app", &dom);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, "https://spa.example/f/a.zip");
        assert_eq!(extract_title(&dom).as_deref(), Some("App"));
    }
}
