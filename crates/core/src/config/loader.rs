use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LINKSCOUT_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from file if it exists, otherwise from defaults plus
/// environment overrides.
pub fn load_config_or_default(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        return load_config(path);
    }

    tracing::info!("No configuration file at {:?}, using defaults", path);
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("LINKSCOUT_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[fetch]
max_retries_per_engine = 4

[scoring]
threshold = 25.0
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.fetch.max_retries_per_engine, 4);
        assert_eq!(config.scoring.threshold, 25.0);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[fetch]
max_retries_per_engine = "lots"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/linkscout.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_or_default_missing_file() {
        let config = load_config_or_default(Path::new("/nonexistent/linkscout.toml")).unwrap();
        assert_eq!(config.fetch.max_retries_per_engine, 2);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[experience]
path = "/tmp/exp.json"

[engines]
yt_dlp_path = "/opt/bin/yt-dlp"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.experience.path.to_str(), Some("/tmp/exp.json"));
        assert_eq!(config.engines.yt_dlp_path.to_str(), Some("/opt/bin/yt-dlp"));
        // untouched sections keep their defaults
        assert_eq!(config.fetch.engine_order, vec!["reqwest", "curl-impersonate"]);
    }
}
