//! Worker metrics collection.
//!
//! Provides standardized metrics for the poll-process loop:
//! - Job lifecycle counters (received, completed, failed, dead-lettered)
//! - Stage and whole-job durations
//! - Publish failure and interruption counters

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};

// =============================================================================
// Recorder Installation
// =============================================================================

/// Install the Prometheus recorder with an HTTP scrape listener.
///
/// `METRICS_DISABLED` skips installation entirely; `METRICS_PORT`
/// overrides the default listener port. Must be called from within the
/// runtime.
pub fn init_metrics() {
    if std::env::var("METRICS_DISABLED").is_ok() {
        info!("Metrics exporter disabled");
        return;
    }

    let port: u16 = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9184);

    match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
    {
        Ok(()) => info!("Metrics exporter listening on port {}", port),
        Err(e) => warn!("Failed to install metrics exporter: {}", e),
    }
}

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Jobs leased from the task queue.
    pub const JOBS_RECEIVED_TOTAL: &str = "worker_jobs_received_total";

    /// Jobs that completed and published a success event.
    pub const JOBS_COMPLETED_TOTAL: &str = "worker_jobs_completed_total";

    /// Jobs that ended in a terminal failure, by kind.
    pub const JOBS_FAILED_TOTAL: &str = "worker_jobs_failed_total";

    /// Jobs this worker moved to the dead letter queue.
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "worker_jobs_dead_lettered_total";

    /// Message bodies dropped because they did not parse as a job.
    pub const MALFORMED_JOBS_TOTAL: &str = "worker_malformed_jobs_total";

    /// Terminal events that could not be published.
    pub const PUBLISH_FAILURES_TOTAL: &str = "worker_publish_failures_total";

    /// Spot interruption notices observed.
    pub const PREEMPTION_NOTICES_TOTAL: &str = "worker_preemption_notices_total";

    /// Per-stage wall time in seconds.
    pub const STAGE_DURATION_SECONDS: &str = "worker_stage_duration_seconds";

    /// Whole-job wall time in seconds.
    pub const JOB_DURATION_SECONDS: &str = "worker_job_duration_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record a job leased from the task queue.
pub fn record_job_received() {
    counter!(names::JOBS_RECEIVED_TOTAL).increment(1);
}

/// Record a completed job and its total duration.
pub fn record_job_completed(duration_ms: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_ms / 1000.0);
}

/// Record a terminal job failure.
pub fn record_job_failed(kind: &str) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record a job moved to the dead letter queue.
pub fn record_dead_letter() {
    counter!(names::JOBS_DEAD_LETTERED_TOTAL).increment(1);
}

/// Record a message body that did not parse as a job.
pub fn record_malformed_job() {
    counter!(names::MALFORMED_JOBS_TOTAL).increment(1);
}

/// Record a result event that could not be published.
pub fn record_publish_failure() {
    counter!(names::PUBLISH_FAILURES_TOTAL).increment(1);
}

/// Record an observed spot interruption notice.
pub fn record_preemption_notice() {
    counter!(names::PREEMPTION_NOTICES_TOTAL).increment(1);
}

/// Record wall time spent in one pipeline stage.
pub fn record_stage_duration(stage: &str, duration_ms: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage.to_string())
        .record(duration_ms / 1000.0);
}

// =============================================================================
// Tests
// =============================================================================
