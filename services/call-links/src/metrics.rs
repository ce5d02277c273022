//! Prometheus metrics exposition
//!
//! Counters for the two provider-facing operations:
//!
//! - `oauth_authorize_total` (counter): label `outcome`
//! - `oauth_refresh_total` (counter): label `outcome`
//!
//! `outcome` is `ok` or the error taxonomy string (`not_connected`,
//! `temporarily_unavailable`, `integration_failure`).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering
/// metrics on the `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record an authorization code exchange attempt.
pub fn record_authorize(outcome: &str) {
    metrics::counter!("oauth_authorize_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a token refresh attempt.
pub fn record_refresh(outcome: &str) {
    metrics::counter!("oauth_refresh_total", "outcome" => outcome.to_string()).increment(1);
}
