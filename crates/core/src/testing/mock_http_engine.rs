//! Mock HTTP engine for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::fetch::{AttemptError, EngineCapabilities, FetchRequest, FetchResponse, HttpEngine};
use crate::identity::Identity;

/// A recorded request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub method: String,
    pub user_agent: String,
    pub proxy: Option<String>,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct State {
    requests: Vec<RecordedRequest>,
    responses: VecDeque<Result<FetchResponse, AttemptError>>,
    default_response: Option<FetchResponse>,
    robots: Option<String>,
    cleared_hosts: Vec<String>,
    persist_count: usize,
}

/// Mock implementation of the HttpEngine trait.
///
/// Responses are served from a queue, then from the default response, and
/// fail with a transport error when both are empty. `robots.txt` requests
/// bypass the queue: 404 unless a body was set with `set_robots`.
///
/// # Example
///
/// ```rust,ignore
/// let engine = MockHttpEngine::new("plain");
/// engine.push_status(503, "unavailable");
/// engine.push_status(200, "<html>ok</html>");
///
/// let escalator = FetchEscalator::new(vec![Arc::new(engine)], identities, policy, robots);
/// ```
#[derive(Debug)]
pub struct MockHttpEngine {
    name: String,
    capabilities: EngineCapabilities,
    delay: Duration,
    state: Arc<Mutex<State>>,
}

impl MockHttpEngine {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: EngineCapabilities {
                scoped_cookies: true,
                bypasses_edge_block: false,
            },
            delay: Duration::ZERO,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn with_capabilities(mut self, capabilities: EngineCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Make every request take `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Handle sharing this engine's state, for assertions after the engine
    /// was moved into an escalator.
    pub fn handle(&self) -> MockHttpEngine {
        MockHttpEngine {
            name: self.name.clone(),
            capabilities: self.capabilities,
            delay: self.delay,
            state: Arc::clone(&self.state),
        }
    }

    pub fn push_response(&self, response: Result<FetchResponse, AttemptError>) {
        self.lock().responses.push_back(response);
    }

    /// Queue a response with `status` and `body`.
    pub fn push_status(&self, status: u16, body: &str) {
        let response = super::fixtures::fetch_response(&self.name, status, body);
        self.push_response(Ok(response));
    }

    /// Serve `body` for `/robots.txt`.
    pub fn set_robots(&self, body: &str) {
        self.lock().robots = Some(body.to_string());
    }

    pub fn set_default_response(&self, response: FetchResponse) {
        self.lock().default_response = Some(response);
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| !r.url.ends_with("/robots.txt"))
            .cloned()
            .collect()
    }

    /// All requests including robots.txt lookups.
    pub fn all_requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.recorded_requests().len()
    }

    pub fn cleared_hosts(&self) -> Vec<String> {
        self.lock().cleared_hosts.clone()
    }

    pub fn persist_count(&self) -> usize {
        self.lock().persist_count
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HttpEngine for MockHttpEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn clear_domain_cookies(&self, host: &str) {
        self.lock().cleared_hosts.push(host.to_string());
    }

    async fn execute(
        &self,
        request: &FetchRequest,
        identity: &Identity,
    ) -> Result<FetchResponse, AttemptError> {
        let url = request
            .full_url()
            .map_err(|e| AttemptError::Transport(e.to_string()))?
            .to_string();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            url: url.clone(),
            method: request.method.to_string(),
            user_agent: identity.user_agent.clone(),
            proxy: identity.proxy.clone(),
            headers: identity.headers.clone(),
        });

        if url.ends_with("/robots.txt") {
            return Ok(match &state.robots {
                Some(body) => super::fixtures::fetch_response(&self.name, 200, body),
                None => super::fixtures::fetch_response(&self.name, 404, ""),
            });
        }

        if let Some(response) = state.responses.pop_front() {
            return response.map(|mut r| {
                if r.final_url.is_empty() {
                    r.final_url = url;
                }
                r
            });
        }
        match &state.default_response {
            Some(response) => {
                let mut response = response.clone();
                if response.final_url.is_empty() {
                    response.final_url = url;
                }
                Ok(response)
            }
            None => Err(AttemptError::Transport("no mock response queued".to_string())),
        }
    }

    fn persist_cookies(&self) {
        self.lock().persist_count += 1;
    }
}
