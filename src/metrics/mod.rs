//! Metrics module
//!
//! Provides Prometheus metrics for the upload endpoint.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Histogram,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "smslog_uploads_total",
        "Total number of handled uploads by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "smslog_upload_bytes_total",
        "Total bytes stored"
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "smslog_upload_duration_seconds",
        "Time spent handling a received upload",
        vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "smslog_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a handled upload
///
/// # Arguments
/// * `outcome` - `stored`, an upload status label, or an error label
/// * `duration_secs` - Handling time in seconds
pub fn record_upload(outcome: &str, duration_secs: f64) {
    UPLOADS_TOTAL.with_label_values(&[outcome]).inc();
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record bytes written to the store
pub fn record_stored_bytes(bytes: u64) {
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
