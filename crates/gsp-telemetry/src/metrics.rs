//! Prometheus metrics for the dispatch platform.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. Registration only
//! fails on a duplicate metric name, a startup-time configuration bug
//! that should crash immediately rather than run silently unobserved.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge_vec,
    CounterVec, GaugeVec, HistogramVec, IntGaugeVec,
};

/// Batches created, labeled by source (`upload`/`api`).
pub static BATCHES_CREATED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("gsp_batches_created_total", "Total batches created", &["source"])
        .unwrap()
});

/// Orders enqueued by the dispatcher.
pub static ORDERS_DISPATCHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gsp_orders_dispatched_total",
        "Total orders enqueued into the orders lane",
        &["batch_id"]
    )
    .unwrap()
});

/// Orders finished, labeled by terminal status (`completed`/`failed`/`cancelled`).
pub static ORDERS_FINISHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gsp_orders_finished_total",
        "Total orders reaching a terminal status",
        &["status"]
    )
    .unwrap()
});

/// Order retries, labeled by trigger (`automatic`/`manual`).
pub static ORDER_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("gsp_order_retries_total", "Total order retries issued", &["trigger"])
        .unwrap()
});

/// Whole-order processing duration.
pub static ORDER_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gsp_order_duration_seconds",
        "Order processing duration in seconds",
        &["status"],
        vec![5.0, 10.0, 20.0, 30.0, 45.0, 60.0, 90.0, 120.0, 180.0, 300.0, 600.0]
    )
    .unwrap()
});

/// Per-step driver duration, the browser pipeline's main cost center.
pub static DRIVER_STEP_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "gsp_driver_step_duration_seconds",
        "Browser driver step duration in seconds",
        &["step"],
        vec![0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 45.0, 60.0]
    )
    .unwrap()
});

/// Step-level driver error count, by error step.
pub static DRIVER_STEP_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "gsp_driver_step_errors_total",
        "Total driver step failures",
        &["step"]
    )
    .unwrap()
});

/// Current depth of each queue lane.
pub static QUEUE_DEPTH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!("gsp_queue_depth", "Current claimable task count per lane", &["lane"])
        .unwrap()
});

/// Worker processes currently holding an `in_progress` order.
pub static ACTIVE_WORKERS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "gsp_active_workers",
        "Distinct worker ids currently processing an order",
        &["pool"]
    )
    .unwrap()
});

/// Metrics facade for easy call-site access.
pub struct Metrics;

impl Metrics {
    pub fn batch_created(source: &str) {
        BATCHES_CREATED_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn order_dispatched(batch_id: &str) {
        ORDERS_DISPATCHED_TOTAL.with_label_values(&[batch_id]).inc();
    }

    pub fn order_finished(status: &str, duration_seconds: f64) {
        ORDERS_FINISHED_TOTAL.with_label_values(&[status]).inc();
        ORDER_DURATION_SECONDS
            .with_label_values(&[status])
            .observe(duration_seconds);
    }

    pub fn order_retried(trigger: &str) {
        ORDER_RETRIES_TOTAL.with_label_values(&[trigger]).inc();
    }

    pub fn driver_step_duration(step: &str, seconds: f64) {
        DRIVER_STEP_DURATION_SECONDS
            .with_label_values(&[step])
            .observe(seconds);
    }

    pub fn driver_step_error(step: &str) {
        DRIVER_STEP_ERRORS_TOTAL.with_label_values(&[step]).inc();
    }

    pub fn queue_depth_set(lane: &str, depth: f64) {
        QUEUE_DEPTH.with_label_values(&[lane]).set(depth);
    }

    pub fn active_workers_set(pool: &str, count: i64) {
        ACTIVE_WORKERS.with_label_values(&[pool]).set(count);
    }
}

/// Renders every registered metric in Prometheus text exposition format,
/// for the `GET /metrics` ambient endpoint.
pub fn gather_text() -> crate::error::TelemetryResult<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    encoder
        .encode(&families, &mut buf)
        .map_err(|e| crate::error::TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| crate::error::TelemetryError::Metrics(e.to_string()))
}
