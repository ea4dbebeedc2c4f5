//! SQS-backed job queue with lease semantics.

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};

/// SQS caps message visibility at 12 hours.
const MAX_VISIBILITY_SECS: u64 = 43_200;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Task queue URL jobs are leased from
    pub task_queue_url: String,
    /// Dead letter queue URL for jobs that will never succeed
    pub dead_letter_queue_url: Option<String>,
    /// Endpoint override (localstack)
    pub endpoint_url: Option<String>,
    /// Visibility timeout applied on receive
    pub visibility_timeout: Duration,
    /// Delivery attempts before attempt-count escalation publishes failure
    pub max_receive_count: u32,
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Ok(Self {
            task_queue_url: std::env::var("TASK_QUEUE_URL")
                .map_err(|_| QueueError::config_error("TASK_QUEUE_URL not set"))?,
            dead_letter_queue_url: std::env::var("DEAD_LETTER_QUEUE_URL").ok(),
            endpoint_url: std::env::var("QUEUE_ENDPOINT_URL").ok(),
            visibility_timeout: Duration::from_secs(
                std::env::var("QUEUE_VISIBILITY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_receive_count: std::env::var("QUEUE_MAX_RECEIVE_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3),
        })
    }
}

/// Exclusive claim on one delivered copy of a job.
///
/// Opaque to callers; valid until deleted, released, or expired.
#[derive(Debug, Clone)]
pub struct Lease {
    receipt_handle: String,
}

impl Lease {
    pub fn new(receipt_handle: impl Into<String>) -> Self {
        Self {
            receipt_handle: receipt_handle.into(),
        }
    }

    pub fn receipt_handle(&self) -> &str {
        &self.receipt_handle
    }
}

/// One delivered message: raw body, lease, and delivery metadata.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Queue-assigned message id, for logging
    pub message_id: String,
    /// Raw message body as received
    pub body: String,
    /// Lease bound to this delivery
    pub lease: Lease,
    /// How many times the queue has offered this job, including this one
    pub attempt_count: u32,
}

/// Job queue client.
#[derive(Clone)]
pub struct JobQueue {
    client: Client,
    config: QueueConfig,
}

impl JobQueue {
    /// Create a new job queue client.
    pub async fn new(config: QueueConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        Self {
            client: Client::new(&sdk_config),
            config,
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> QueueResult<Self> {
        Ok(Self::new(QueueConfig::from_env()?).await)
    }

    /// Create from an existing SQS client.
    pub fn with_client(client: Client, config: QueueConfig) -> Self {
        Self { client, config }
    }

    /// Lease one job from the task queue.
    ///
    /// Non-blocking single-message fetch; `None` means no work is
    /// available right now. The returned body is unparsed so a malformed
    /// payload can still be dead-lettered or deleted by its lease.
    pub async fn lease(&self) -> QueueResult<Option<Delivery>> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.config.task_queue_url)
            .max_number_of_messages(1)
            .visibility_timeout(self.config.visibility_timeout.as_secs() as i32)
            // ApproximateReceiveCount drives retry escalation
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| QueueError::receive_failed(e.to_string()))?;

        let Some(message) = response.messages().first() else {
            return Ok(None);
        };

        let Some(receipt_handle) = message.receipt_handle() else {
            warn!("Received message without receipt handle, skipping");
            return Ok(None);
        };

        let attempt_count = message
            .attributes()
            .and_then(|a| a.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .map(|s| parse_attempt_count(s))
            .unwrap_or(1);

        let delivery = Delivery {
            message_id: message.message_id().unwrap_or_default().to_string(),
            body: message.body().unwrap_or_default().to_string(),
            lease: Lease::new(receipt_handle),
            attempt_count,
        };

        debug!(
            message_id = %delivery.message_id,
            attempt = delivery.attempt_count,
            "Leased message from task queue"
        );

        Ok(Some(delivery))
    }

    /// Extend a lease to the given duration from now.
    pub async fn extend(&self, lease: &Lease, duration: Duration) -> QueueResult<()> {
        let timeout = duration.as_secs().min(MAX_VISIBILITY_SECS) as i32;

        self.client
            .change_message_visibility()
            .queue_url(&self.config.task_queue_url)
            .receipt_handle(lease.receipt_handle())
            .visibility_timeout(timeout)
            .send()
            .await
            .map_err(|e| QueueError::VisibilityFailed(e.to_string()))?;

        info!("Extended lease visibility to {}s", timeout);
        Ok(())
    }

    /// Release a lease early so the queue redelivers the job sooner.
    pub async fn release(&self, lease: &Lease) -> QueueResult<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.config.task_queue_url)
            .receipt_handle(lease.receipt_handle())
            .visibility_timeout(0)
            .send()
            .await
            .map_err(|e| QueueError::VisibilityFailed(e.to_string()))?;

        info!("Released lease for early redelivery");
        Ok(())
    }

    /// Delete the job behind a lease. The only valid terminal action for
    /// a successfully processed job.
    pub async fn delete(&self, lease: &Lease) -> QueueResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.task_queue_url)
            .receipt_handle(lease.receipt_handle())
            .send()
            .await
            .map_err(|e| QueueError::DeleteFailed(e.to_string()))?;

        debug!("Deleted message from task queue");
        Ok(())
    }

    /// Move a job to the dead letter queue.
    ///
    /// SQS has no atomic move, so this sends the raw body to the dead
    /// letter queue and then deletes from the task queue. A send failure
    /// is an error (another worker retries via redelivery); a delete
    /// failure after a successful send leaves a duplicate in the dead
    /// letter queue and is tolerated.
    pub async fn move_to_dead_letter(
        &self,
        lease: &Lease,
        raw_body: &str,
        id: &str,
    ) -> QueueResult<()> {
        let Some(dlq_url) = self.config.dead_letter_queue_url.clone() else {
            warn!(job_id = %id, "No dead letter queue configured, deleting message instead");
            return self.delete(lease).await;
        };

        self.send(&dlq_url, raw_body, id)
            .await
            .map_err(|e| QueueError::dead_letter_failed(e.to_string()))?;

        if let Err(e) = self.delete(lease).await {
            warn!(
                job_id = %id,
                "Sent to dead letter queue but failed to delete original: {}",
                e
            );
        }

        warn!(job_id = %id, "Moved job to dead letter queue");
        Ok(())
    }

    /// Send a message to a queue. FIFO queues get a message group id
    /// equal to the provided id.
    pub async fn send(&self, queue_url: &str, body: &str, id: &str) -> QueueResult<String> {
        let mut request = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body);

        if is_fifo(queue_url) {
            request = request.message_group_id(id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueueError::send_failed(e.to_string()))?;

        let message_id = response.message_id().unwrap_or_default().to_string();
        info!(message_id = %message_id, "Message sent");
        Ok(message_id)
    }

    /// Max delivery attempts from config.
    pub fn max_receive_count(&self) -> u32 {
        self.config.max_receive_count
    }

    /// Configured visibility timeout applied on receive.
    pub fn visibility_timeout(&self) -> Duration {
        self.config.visibility_timeout
    }
}

fn is_fifo(queue_url: &str) -> bool {
    queue_url.contains(".fifo")
}

/// Parse `ApproximateReceiveCount`; a missing or unparseable value counts
/// as the first delivery.
fn parse_attempt_count(raw: &str) -> u32 {
    raw.parse().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_detection() {
        assert!(is_fifo("https://sqs.eu-west-1.amazonaws.com/123/tasks.fifo"));
        assert!(!is_fifo("https://sqs.eu-west-1.amazonaws.com/123/tasks"));
    }

    #[test]
    fn test_attempt_count_parsing() {
        assert_eq!(parse_attempt_count("3"), 3);
        assert_eq!(parse_attempt_count("1"), 1);
        assert_eq!(parse_attempt_count("garbage"), 1);
        assert_eq!(parse_attempt_count(""), 1);
    }

    #[test]
    fn test_visibility_clamped_to_sqs_maximum() {
        let over = Duration::from_secs(MAX_VISIBILITY_SECS + 500);
        assert_eq!(over.as_secs().min(MAX_VISIBILITY_SECS), MAX_VISIBILITY_SECS);
    }

    #[test]
    fn test_config_from_env_applies_defaults() {
        std::env::set_var("TASK_QUEUE_URL", "https://sqs.test/123/tasks");
        std::env::remove_var("DEAD_LETTER_QUEUE_URL");
        std::env::remove_var("QUEUE_ENDPOINT_URL");
        std::env::remove_var("QUEUE_VISIBILITY_SECS");
        std::env::remove_var("QUEUE_MAX_RECEIVE_COUNT");

        let config = QueueConfig::from_env().unwrap();
        assert_eq!(config.task_queue_url, "https://sqs.test/123/tasks");
        assert!(config.dead_letter_queue_url.is_none());
        assert_eq!(config.visibility_timeout, Duration::from_secs(300));
        assert_eq!(config.max_receive_count, 3);
    }

    #[test]
    fn test_lease_wraps_receipt_handle() {
        let lease = Lease::new("AQEB...handle");
        assert_eq!(lease.receipt_handle(), "AQEB...handle");
    }
}
