//! Terminal result publication.
//!
//! Exactly one terminal event per processing attempt goes to the
//! results queue. A publish failure is an operational problem, not a
//! job failure: it is logged and counted, never propagated, so a
//! finished job cannot get stuck retrying over a notification.

use chrono::Utc;
use tracing::{info, warn};

use hark_models::{FailureKind, Job, OutputKeys, ResultEvent};
use hark_queue::JobQueue;
use hark_records::{TranscriptRecord, TranscriptStore};

use crate::metrics;

pub struct ResultPublisher {
    queue: JobQueue,
    results_queue_url: String,
    store: Option<TranscriptStore>,
}

impl ResultPublisher {
    pub fn new(
        queue: JobQueue,
        results_queue_url: impl Into<String>,
        store: Option<TranscriptStore>,
    ) -> Self {
        Self {
            queue,
            results_queue_url: results_queue_url.into(),
            store,
        }
    }

    /// Publish the success event, then record the completed transcript.
    pub async fn publish_success(
        &self,
        job: &Job,
        output_keys: OutputKeys,
        language: Option<String>,
        translated: bool,
    ) {
        let event = ResultEvent::success(job, output_keys.clone(), language.clone());
        if !self.publish_event(&event).await {
            return;
        }

        let Some(store) = &self.store else {
            return;
        };
        let record = TranscriptRecord {
            id: job.id.to_string(),
            original_filename: job.original_filename.clone(),
            transcript_keys: output_keys,
            user_email: job.user_email.clone(),
            completed_at: Utc::now(),
            is_translation: translated,
            language_code: language,
            export_statuses: None,
        };
        // The event is already out; losing the record only loses the
        // export index entry.
        if let Err(e) = store.put_record(&record).await {
            warn!("Failed to record completed transcript {}: {}", record.id, e);
        }
    }

    /// Publish a terminal failure event.
    pub async fn publish_failure(&self, job: &Job, kind: FailureKind) {
        let event = ResultEvent::failure(job, kind);
        self.publish_event(&event).await;
    }

    /// Publish a prebuilt event. Returns whether the send succeeded.
    pub async fn publish_event(&self, event: &ResultEvent) -> bool {
        let body = match serde_json::to_string(event) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to serialize result event for {}: {}", event.id, e);
                metrics::record_publish_failure();
                return false;
            }
        };

        match self.queue.send(&self.results_queue_url, &body, &event.id).await {
            Ok(_) => {
                info!(
                    "Published {} event for job {}",
                    event.status.as_str(),
                    event.id
                );
                true
            }
            Err(e) => {
                warn!(
                    "Failed to publish {} event for job {}: {}",
                    event.status.as_str(),
                    event.id,
                    e
                );
                metrics::record_publish_failure();
                false
            }
        }
    }
}
