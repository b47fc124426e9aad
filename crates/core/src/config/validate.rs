use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Retry policy is usable (at least one attempt, base delay <= max delay)
/// - Engine order is non-empty and only names declared engines
/// - Strategy cost overrides are within 1..=10
/// - Scoring threshold is not negative
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let fetch = &config.fetch;

    if fetch.max_retries_per_engine == 0 {
        return Err(ConfigError::ValidationError(
            "fetch.max_retries_per_engine cannot be 0".to_string(),
        ));
    }

    if fetch.retry_base_delay_ms > fetch.retry_max_delay_ms {
        return Err(ConfigError::ValidationError(format!(
            "fetch.retry_base_delay_ms ({}) exceeds fetch.retry_max_delay_ms ({})",
            fetch.retry_base_delay_ms, fetch.retry_max_delay_ms
        )));
    }

    if fetch.engine_order.is_empty() {
        return Err(ConfigError::ValidationError(
            "fetch.engine_order cannot be empty".to_string(),
        ));
    }

    for name in &fetch.engine_order {
        if !fetch.engines.iter().any(|e| &e.name == name) {
            return Err(ConfigError::ValidationError(format!(
                "fetch.engine_order references undeclared engine '{}'",
                name
            )));
        }
    }

    for (kind, cost) in &config.scoring.costs {
        if !(1..=10).contains(cost) {
            return Err(ConfigError::ValidationError(format!(
                "scoring.costs.{} must be within 1..=10, got {}",
                kind, cost
            )));
        }
    }

    if config.scoring.threshold < 0.0 {
        return Err(ConfigError::ValidationError(
            "scoring.threshold cannot be negative".to_string(),
        ));
    }

    Ok(())
}
