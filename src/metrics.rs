//! Metrics collection for batch runs
//!
//! Provides Prometheus-compatible metrics for monitoring run outcomes,
//! per-item latency and in-flight load.

use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

use crate::batch::ItemStatus;

lazy_static! {
    /// Counter for batch runs by outcome
    static ref BATCH_RUNS: IntCounterVec = register_int_counter_vec!(
        "batchflow_runs_total",
        "Total number of batch runs",
        &["status"]
    ).expect("metric can be registered");

    /// Histogram for whole-run duration
    static ref RUN_DURATION: Histogram = register_histogram!(
        "batchflow_run_duration_seconds",
        "Batch run duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    ).expect("metric can be registered");

    /// Counter for settled items by status
    static ref ITEMS: IntCounterVec = register_int_counter_vec!(
        "batchflow_items_total",
        "Total number of settled work items",
        &["status"]
    ).expect("metric can be registered");

    /// Histogram for per-item processor duration
    static ref ITEM_DURATION: HistogramVec = register_histogram_vec!(
        "batchflow_item_duration_seconds",
        "Work item duration in seconds",
        &["status"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).expect("metric can be registered");

    /// Counter for items handed to the processor
    static ref ITEMS_LAUNCHED: IntCounter = register_int_counter!(
        "batchflow_items_launched_total",
        "Total number of work items launched"
    ).expect("metric can be registered");

    /// Gauge for active runs
    static ref ACTIVE_RUNS: IntGauge = register_int_gauge!(
        "batchflow_active_runs",
        "Number of batch runs currently executing"
    ).expect("metric can be registered");
}

fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Completed => "completed",
        ItemStatus::Failed => "failed",
    }
}

/// Record a settled item
pub fn record_item(status: ItemStatus, duration: Duration) {
    let label = status_label(status);
    ITEMS.with_label_values(&[label]).inc();
    ITEM_DURATION
        .with_label_values(&[label])
        .observe(duration.as_secs_f64());
}

/// Record items handed to the processor
pub fn record_launched(count: usize) {
    ITEMS_LAUNCHED.inc_by(count as u64);
}

/// Record a finished run
pub fn record_run(success: bool, duration: Duration) {
    let label = if success { "success" } else { "failure" };
    BATCH_RUNS.with_label_values(&[label]).inc();
    RUN_DURATION.observe(duration.as_secs_f64());
}

/// Tracks one active run for the lifetime of the guard
pub struct RunGuard;

impl RunGuard {
    pub fn start() -> Self {
        ACTIVE_RUNS.inc();
        RunGuard
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        ACTIVE_RUNS.dec();
    }
}

/// Export all metrics in Prometheus text format
pub fn export() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
