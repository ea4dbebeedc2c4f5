//! Job executor.
//!
//! Sequential poll-process loop: lease one job, run the pipeline with
//! an interruption monitor alongside, act on the escalation decision,
//! repeat. Queue substrate failures back the loop off instead of
//! crashing it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use hark_models::{FailureKind, Job, ResultEvent, ResultStatus};
use hark_queue::{Delivery, JobQueue};
use hark_records::TranscriptStore;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::escalation::{self, Escalation};
use crate::logging::JobLogger;
use crate::metrics;
use crate::outcome::ProcessingOutcome;
use crate::pipeline::MediaPipeline;
use crate::preemption::PreemptionMonitor;
use crate::protection::ScaleInProtection;
use crate::publisher::ResultPublisher;

/// Job executor that drains the task queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    pipeline: MediaPipeline,
    publisher: ResultPublisher,
    protection: ScaleInProtection,
    http: reqwest::Client,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub async fn new(config: WorkerConfig, queue: JobQueue) -> WorkerResult<Self> {
        let http = reqwest::Client::new();

        // The records table is optional; without it the worker still
        // publishes events, it just writes no export index.
        let store = match TranscriptStore::from_env().await {
            Ok(store) => Some(store),
            Err(e) => {
                info!("Transcript records disabled: {}", e);
                None
            }
        };

        let protection = ScaleInProtection::new(
            config.autoscaling_group.clone(),
            &config.imds_base_url,
            &http,
        )
        .await?;

        let queue = Arc::new(queue);
        let pipeline = MediaPipeline::new(config.clone(), http.clone(), (*queue).clone());
        let publisher =
            ResultPublisher::new((*queue).clone(), config.results_queue_url.clone(), store);
        let (shutdown, _) = tokio::sync::watch::channel(false);

        Ok(Self {
            config,
            queue,
            pipeline,
            publisher,
            protection,
            http,
            shutdown,
        })
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor; polling every {:?}",
            self.config.poll_interval
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.poll_once() => {
                    match result {
                        Ok(true) => {}
                        Ok(false) => tokio::time::sleep(self.config.poll_interval).await,
                        Err(e) => {
                            error!("Poll failed: {}", e);
                            // Back off on error
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }
            }
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// One protected poll attempt. Returns whether a job was handled.
    async fn poll_once(&self) -> WorkerResult<bool> {
        // Never take on work while this host is eligible for scale-in.
        self.protection.acquire().await?;
        let result = self.lease_and_process().await;
        self.protection.release().await;
        result
    }

    async fn lease_and_process(&self) -> WorkerResult<bool> {
        let Some(delivery) = self.queue.lease().await? else {
            return Ok(false);
        };
        metrics::record_job_received();
        self.handle_delivery(delivery).await?;
        Ok(true)
    }

    /// Process one delivery end to end.
    async fn handle_delivery(&self, delivery: Delivery) -> WorkerResult<()> {
        let job: Job = match serde_json::from_str(&delivery.body) {
            Ok(job) => job,
            Err(e) => return self.reject_malformed(&delivery, &e.to_string()).await,
        };

        let logger = JobLogger::new(&job.id, "transcription");
        logger.log_start(&format!(
            "Processing {} (attempt {} of {})",
            job.original_filename,
            delivery.attempt_count,
            self.queue.max_receive_count()
        ));

        let monitor = PreemptionMonitor::start(
            self.http.clone(),
            self.config.imds_base_url.clone(),
            self.config.preemption_interval,
            (*self.queue).clone(),
            delivery.lease.clone(),
        );

        let started = Instant::now();
        let outcome = self.pipeline.run(&job, &delivery.lease, &logger).await;
        if let Some(at) = monitor.termination_time() {
            // The lease was shortened when the notice arrived; another
            // host may already hold a fresh delivery of this job.
            warn!("Job {} finished after an interruption notice for {}", job.id, at);
        }
        monitor.stop().await;

        self.escalate(&delivery, &job, outcome, started, &logger).await
    }

    /// Act on the escalation decision for a finished attempt.
    async fn escalate(
        &self,
        delivery: &Delivery,
        job: &Job,
        outcome: ProcessingOutcome,
        started: Instant,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        let attempt = delivery.attempt_count;
        let max = self.queue.max_receive_count();

        match escalation::decide(&outcome, attempt, max) {
            Escalation::Complete => {
                if let ProcessingOutcome::Success {
                    output_keys,
                    language,
                    translated,
                } = outcome
                {
                    self.queue.delete(&delivery.lease).await?;
                    self.publisher
                        .publish_success(job, output_keys, language, translated)
                        .await;
                    metrics::record_job_completed(started.elapsed().as_millis() as f64);
                    logger.log_completion("Artifacts uploaded and success event published");
                }
            }
            Escalation::DeadLetter { kind } => {
                warn!(
                    "Job {} failed deterministically, moving to dead letter queue",
                    job.id
                );
                metrics::record_job_failed(ResultStatus::from(kind).as_str());
                metrics::record_dead_letter();
                self.queue
                    .move_to_dead_letter(&delivery.lease, &delivery.body, job.id.as_str())
                    .await?;
                self.publisher.publish_failure(job, kind).await;
            }
            Escalation::Redeliver => {
                logger.log_warning(&format!(
                    "Attempt {} of {} failed; releasing for redelivery",
                    attempt, max
                ));
                self.queue.release(&delivery.lease).await?;
            }
            Escalation::Exhausted { kind } => {
                logger.log_error(&format!(
                    "Retry budget exhausted after {} attempts",
                    attempt
                ));
                metrics::record_job_failed(ResultStatus::from(kind).as_str());
                self.publisher.publish_failure(job, kind).await;
                // The lease stays put; the queue's redrive policy
                // dead-letters the message without a second copy.
            }
            Escalation::Fatal { kind } => {
                metrics::record_job_failed(ResultStatus::from(kind).as_str());
                self.publisher.publish_failure(job, kind).await;
                self.queue.delete(&delivery.lease).await?;
            }
        }

        Ok(())
    }

    /// Drop a delivery whose body does not parse. Consumes no retry
    /// budget: the failure is reported once and the message deleted.
    async fn reject_malformed(&self, delivery: &Delivery, parse_error: &str) -> WorkerResult<()> {
        error!(
            message_id = %delivery.message_id,
            body = %delivery.body,
            "Dropping malformed job message: {}", parse_error
        );
        metrics::record_malformed_job();

        let outcome = ProcessingOutcome::FatalFailure {
            cause: parse_error.to_string(),
        };
        if let Escalation::Fatal { kind } = escalation::decide(
            &outcome,
            delivery.attempt_count,
            self.queue.max_receive_count(),
        ) {
            let event = malformed_event(&delivery.body, kind);
            metrics::record_job_failed(event.status.as_str());
            self.publisher.publish_event(&event).await;
        }

        self.queue.delete(&delivery.lease).await?;
        Ok(())
    }
}

/// Best-effort failure event for a body that did not parse as a job.
/// Whatever identifying fields survive in the JSON are carried over so
/// downstream consumers can attribute the failure.
fn malformed_event(body: &str, kind: FailureKind) -> ResultEvent {
    let value: serde_json::Value = serde_json::from_str(body).unwrap_or(serde_json::Value::Null);
    let field = |name: &str| {
        value
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    };

    ResultEvent {
        id: field("id"),
        status: kind.into(),
        original_filename: field("originalFilename"),
        user_email: field("userEmail"),
        language_code: None,
        output_keys: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_event_recovers_identity_fields() {
        let body = r#"{"id": "job-1", "originalFilename": "a.mp3", "userEmail": "u@example.com", "inputRef": 42}"#;
        let event = malformed_event(body, FailureKind::Transcription);
        assert_eq!(event.id, "job-1");
        assert_eq!(event.original_filename, "a.mp3");
        assert_eq!(event.user_email, "u@example.com");
        assert_eq!(event.status, ResultStatus::TranscriptionFailure);
        assert!(event.output_keys.is_none());
        assert!(event.language_code.is_none());
    }

    #[test]
    fn test_malformed_event_defaults_missing_fields() {
        let event = malformed_event("not json at all", FailureKind::Transcription);
        assert_eq!(event.id, "unknown");
        assert_eq!(event.original_filename, "unknown");
        assert_eq!(event.user_email, "unknown");
    }
}
