//! Worker configuration.

use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Queue URL terminal result events are sent to
    pub results_queue_url: String,
    /// Idle sleep between empty polls
    pub poll_interval: Duration,
    /// Seconds added on top of the media duration when extending the lease
    /// (covers recognition model load time)
    pub lease_margin_secs: u64,
    /// Work directory for per-job scratch space
    pub work_dir: String,
    /// Recognition tool binary
    pub whisper_bin: String,
    /// ggml model file passed to the recognition tool
    pub whisper_model: String,
    /// Worker threads for the recognition tool
    pub whisper_threads: u32,
    /// Optional wall-clock limit for a single tool run
    pub tool_timeout_secs: Option<u64>,
    /// Auto-scaling group for scale-in protection; unset disables the guard
    pub autoscaling_group: Option<String>,
    /// Instance metadata service base URL
    pub imds_base_url: String,
    /// Spot interruption poll interval
    pub preemption_interval: Duration,
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let results_queue_url = std::env::var("RESULTS_QUEUE_URL")
            .map_err(|_| WorkerError::config_error("RESULTS_QUEUE_URL must be set"))?;

        Ok(Self {
            results_queue_url,
            poll_interval: Duration::from_secs(
                std::env::var("WORKER_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            lease_margin_secs: std::env::var("WORKER_LEASE_MARGIN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or_else(|_| "/tmp/hark".to_string()),
            whisper_bin: std::env::var("WORKER_WHISPER_BIN")
                .unwrap_or_else(|_| "whisper-cli".to_string()),
            whisper_model: std::env::var("WORKER_WHISPER_MODEL")
                .unwrap_or_else(|_| "/opt/whisper/ggml-medium.bin".to_string()),
            whisper_threads: std::env::var("WORKER_WHISPER_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            tool_timeout_secs: std::env::var("WORKER_TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            autoscaling_group: std::env::var("WORKER_AUTOSCALING_GROUP")
                .ok()
                .filter(|s| !s.is_empty()),
            imds_base_url: std::env::var("WORKER_IMDS_BASE_URL")
                .unwrap_or_else(|_| "http://169.254.169.254".to_string()),
            preemption_interval: Duration::from_secs(
                std::env::var("WORKER_PREEMPTION_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
        })
    }
}
