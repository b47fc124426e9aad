//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the task orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Capacity of the event channel. A full channel applies backpressure
    /// to the running task, never drops events.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// How long a stop waits for a killed process to be reaped (milliseconds).
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
}

fn default_event_buffer() -> usize {
    256
}

fn default_kill_grace_ms() -> u64 {
    3000 // 3 seconds
}

impl OrchestratorConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            kill_grace_ms: default_kill_grace_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.event_buffer, 256);
        assert_eq!(config.kill_grace(), Duration::from_secs(3));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: OrchestratorConfig = toml::from_str("kill_grace_ms = 500").unwrap();
        assert_eq!(config.kill_grace(), Duration::from_millis(500));
        assert_eq!(config.event_buffer, 256);
    }
}
