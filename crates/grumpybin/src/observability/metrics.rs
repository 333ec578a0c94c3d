//! Metrics definitions for GrumpyBin.
//!
//! All metrics follow Prometheus naming conventions:
//! - `grumpybin_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded by code:
//! - `method`: 5 values (ADD, EDIT, DELETE, GET, NONE)
//! - `status`: 2 values
//! - `operation`: 4 store operations
//! - `outcome`: 2 values (launched, dropped)
//! - `kind`: bounded by [`crate::errors::BinError::kind`]

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within the Tokio runtime, before any metric is
/// recorded. Without a recorder every `record_*` call is a no-op.
///
/// # Errors
///
/// Returns error if bucket configuration fails or a recorder is already installed.
pub fn init_metrics_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        // Store latency buckets - local file or database round trip
        .set_buckets_for_metric(
            Matcher::Prefix("grumpybin_store".to_string()),
            &[
                0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )?
        // Actuation buckets - a full sequence takes seconds
        .set_buckets_for_metric(
            Matcher::Prefix("grumpybin_actuation".to_string()),
            &[0.1, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0, 30.0],
        )?
        .with_http_listener(addr)
        .install()
}

// ============================================================================
// Control plane
// ============================================================================

/// Record a dispatched command.
///
/// Metric: `grumpybin_commands_total`
/// Labels: `method`, `status`
pub fn record_command(method: &'static str, status: &'static str) {
    counter!("grumpybin_commands_total", "method" => method, "status" => status).increment(1);
}

/// Record an inbound payload that could not be decoded.
///
/// Metric: `grumpybin_decode_failures_total`
pub fn record_decode_failure() {
    counter!("grumpybin_decode_failures_total").increment(1);
}

/// Record a response that could not be published.
///
/// Metric: `grumpybin_publish_failures_total`
pub fn record_publish_failure() {
    counter!("grumpybin_publish_failures_total").increment(1);
}

// ============================================================================
// Line store
// ============================================================================

/// Record a line store operation and its latency.
///
/// Metrics: `grumpybin_store_operations_total`, `grumpybin_store_latency_seconds`
/// Labels: `operation` (add, modify, delete, list), `status` (success, error)
pub fn record_store_operation(operation: &'static str, status: &'static str, duration: Duration) {
    counter!("grumpybin_store_operations_total", "operation" => operation, "status" => status)
        .increment(1);
    histogram!("grumpybin_store_latency_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

// ============================================================================
// Activation & actuation
// ============================================================================

/// Record a fire request and whether it launched a sequence.
///
/// Metric: `grumpybin_activations_total`
/// Labels: `outcome` (launched, dropped)
pub fn record_activation(outcome: &'static str) {
    counter!("grumpybin_activations_total", "outcome" => outcome).increment(1);
}

/// Record a failed actuation effect.
///
/// Metric: `grumpybin_actuation_errors_total`
/// Labels: `kind`
pub fn record_actuation_error(kind: &'static str) {
    counter!("grumpybin_actuation_errors_total", "kind" => kind).increment(1);
}

/// Record how long an actuation sequence held the activation guard.
///
/// Metric: `grumpybin_actuation_duration_seconds`
/// Labels: `cancelled` (true, false)
pub fn record_actuation_duration(duration: Duration, cancelled: bool) {
    histogram!(
        "grumpybin_actuation_duration_seconds",
        "cancelled" => if cancelled { "true" } else { "false" }
    )
    .record(duration.as_secs_f64());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_metrics_recorded_with_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_command("ADD", "success");
            record_command("ADD", "success");
            record_decode_failure();
            record_publish_failure();
            record_store_operation("add", "success", Duration::from_millis(2));
            record_activation("launched");
            record_activation("dropped");
            record_actuation_error("empty_store");
            record_actuation_duration(Duration::from_secs(3), false);
        });

        let metrics = snapshotter.snapshot().into_vec();

        let commands = metrics
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "grumpybin_commands_total")
            .expect("commands counter should be recorded");
        assert!(matches!(commands.3, DebugValue::Counter(2)));

        assert!(metrics.len() >= 8, "got {} metrics", metrics.len());
    }
}
