//! Identity configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for identity building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Newline-delimited proxy list. Lines starting with `#` are ignored.
    /// A missing file means no proxies are used.
    #[serde(default)]
    pub proxy_file: Option<PathBuf>,

    /// User agents to rotate through instead of the built-in catalog.
    #[serde(default)]
    pub user_agents: Vec<String>,

    /// Value of the `Accept-Language` header.
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            proxy_file: None,
            user_agents: Vec::new(),
            accept_language: default_accept_language(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal() {
        let config: IdentityConfig = toml::from_str("").unwrap();
        assert!(config.proxy_file.is_none());
        assert!(config.user_agents.is_empty());
        assert!(config.accept_language.starts_with("en-US"));
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            proxy_file = "proxies.txt"
            user_agents = ["ua-one", "ua-two"]
            accept_language = "de-DE,de;q=0.9"
        "#;
        let config: IdentityConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.proxy_file, Some(PathBuf::from("proxies.txt")));
        assert_eq!(config.user_agents.len(), 2);
        assert_eq!(config.accept_language, "de-DE,de;q=0.9");
    }
}
