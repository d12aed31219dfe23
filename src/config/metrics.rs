//! Metrics configuration.

use std::env;

/// Whether Prometheus metrics are collected and exposed
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MetricsConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let enabled = env::var("METRICS_ENABLED")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(true);

        Self { enabled }
    }
}
