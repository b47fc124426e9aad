//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Sniffing (strategy attempts, sniff duration)
//! - Fetch escalation (attempts per engine)
//! - Downloads (items by executor and result)

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Once;

// =============================================================================
// Sniffing
// =============================================================================

/// Strategy attempts by strategy and result.
pub static STRATEGY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "linkscout_strategy_attempts_total",
            "Total strategy attempts during sniffing",
        ),
        &["strategy", "result"], // "success", "no_resources", "failed", "unavailable"
    )
    .unwrap()
});

/// Sniff duration in seconds.
pub static SNIFF_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("linkscout_sniff_duration_seconds", "Duration of sniff tasks")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Tasks rejected because another task was running.
pub static TASKS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "linkscout_tasks_rejected_total",
        "Tasks rejected because the orchestrator was busy",
    )
    .unwrap()
});

// =============================================================================
// Fetch escalation
// =============================================================================

/// Fetch attempts by engine and result.
pub static FETCH_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("linkscout_fetch_attempts_total", "Total HTTP fetch attempts"),
        &["engine", "result"], // "success", "failure", "edge_block", "captcha"
    )
    .unwrap()
});

// =============================================================================
// Downloads
// =============================================================================

/// Downloaded items by executor and result.
pub static DOWNLOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("linkscout_downloads_total", "Total download items processed"),
        &["kind", "result"], // result: "completed", "failed", "cancelled", "skipped"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

pub fn record_strategy_attempt(strategy: &str, result: &str) {
    STRATEGY_ATTEMPTS.with_label_values(&[strategy, result]).inc();
}

pub fn record_fetch_attempt(engine: &str, result: &str) {
    FETCH_ATTEMPTS.with_label_values(&[engine, result]).inc();
}

pub fn record_download(kind: &str, result: &str) {
    DOWNLOADS.with_label_values(&[kind, result]).inc();
}

pub fn observe_sniff(result: &str, seconds: f64) {
    SNIFF_DURATION.with_label_values(&[result]).observe(seconds);
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(STRATEGY_ATTEMPTS.clone()),
        Box::new(SNIFF_DURATION.clone()),
        Box::new(TASKS_REJECTED.clone()),
        Box::new(FETCH_ATTEMPTS.clone()),
        Box::new(DOWNLOADS.clone()),
    ]
}

/// Process-wide registry holding the core metrics.
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static REGISTER: Once = Once::new();

/// Register all core metrics in [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        for metric in all_metrics() {
            if let Err(e) = REGISTRY.register(metric) {
                tracing::warn!("Failed to register metric: {}", e);
            }
        }
    });
}

/// Encode registered metrics in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_touched_metrics() {
        register_metrics();
        register_metrics();

        record_fetch_attempt("reqwest", "success");
        record_strategy_attempt("media_extract", "success");
        record_download("direct", "completed");
        observe_sniff("success", 1.5);

        let output = encode_metrics().unwrap();
        assert!(output.contains("linkscout_fetch_attempts_total"));
        assert!(output.contains("linkscout_strategy_attempts_total"));
        assert!(output.contains("linkscout_downloads_total"));
        assert!(output.contains("linkscout_sniff_duration_seconds"));
        assert!(output.contains("# HELP"));
    }
}
