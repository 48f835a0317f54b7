// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for resilient-store.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `resilient_store_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `path`: remote, fallback
//! - `operation`: get, set, hset, lrange, publish, ...
//! - `status`: success, error, rejected

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record the outcome of an operation on one path
pub fn record_operation(path: &str, operation: &str, status: &str) {
    counter!(
        "resilient_store_operations_total",
        "path" => path.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record remote call latency
pub fn record_latency(path: &str, operation: &str, duration: Duration) {
    histogram!(
        "resilient_store_operation_seconds",
        "path" => path.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a call served in degraded mode
pub fn record_degraded(operation: &str) {
    counter!(
        "resilient_store_degraded_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a connection attempt and how it ended (success, failure)
pub fn record_connect_attempt(outcome: &str) {
    counter!(
        "resilient_store_connect_attempts_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set connection state (0 = Disconnected, 1 = Connecting, 2 = Ready, 3 = Reconnecting, 4 = Failed)
pub fn set_connection_state(state: u8) {
    gauge!("resilient_store_connection_state").set(state as f64);
}

/// Set remote health status (1 = usable, 0 = not usable)
pub fn set_remote_healthy(healthy: bool) {
    gauge!("resilient_store_remote_healthy").set(if healthy { 1.0 } else { 0.0 });
}

/// Set number of keys held by the fallback store
pub fn set_fallback_keys(count: usize) {
    gauge!("resilient_store_fallback_keys").set(count as f64);
}

/// Record a publish that reached nobody because the remote was unusable
pub fn record_publish_dropped() {
    counter!("resilient_store_publish_dropped_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_counters_are_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_operation("remote", "get", "success");
            record_operation("remote", "get", "success");
            record_degraded("set");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let ops = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "resilient_store_operations_total")
            .map(|(_, _, _, value)| value);
        assert_eq!(ops, Some(&DebugValue::Counter(2)));

        assert!(snapshot
            .iter()
            .any(|(key, _, _, _)| key.key().name() == "resilient_store_degraded_total"));
    }

    #[test]
    fn test_gauges_are_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            set_connection_state(2);
            set_remote_healthy(true);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let state = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "resilient_store_connection_state")
            .map(|(_, _, _, value)| value);
        assert!(matches!(state, Some(DebugValue::Gauge(v)) if v.into_inner() == 2.0));
    }

    #[test]
    fn test_publish_drops_share_one_series() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_publish_dropped();
            record_publish_dropped();
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let drops: Vec<_> = snapshot
            .iter()
            .filter(|(key, _, _, _)| key.key().name() == "resilient_store_publish_dropped_total")
            .collect();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0].0.key().labels().count(), 0);
        assert_eq!(drops[0].3, DebugValue::Counter(2));
    }
}
