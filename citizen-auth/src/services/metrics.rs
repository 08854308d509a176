//! Metrics collection and Prometheus export.
//!
//! The recorder is installed once at startup; counters recorded before that
//! (or in tests, where it is never installed) are dropped by the `metrics`
//! facade.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), anyhow::Error> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_activation(outcome: &'static str) {
    metrics::counter!("auth_activations_total", "outcome" => outcome).increment(1);
}

pub fn record_login(outcome: &'static str) {
    metrics::counter!("auth_logins_total", "outcome" => outcome).increment(1);
}

pub fn record_tourist_redemption(outcome: &'static str) {
    metrics::counter!("tourist_redemptions_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(scope: &'static str) {
    metrics::counter!("rate_limited_total", "scope" => scope).increment(1);
}
