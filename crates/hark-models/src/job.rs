//! Transcription job message definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Sentinel language code requesting automatic detection.
pub const LANGUAGE_AUTO: &str = "auto";

/// English language code. Jobs in English are never translated.
pub const LANGUAGE_ENGLISH: &str = "en";

/// Unique identifier for a transcription job.
///
/// Assigned by the producer, one per source artifact. Redelivered copies
/// of a job carry the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A time-boxed reference to one output artifact location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DestinationRef {
    /// Presigned URL the artifact is written through
    pub url: String,
    /// Object key the artifact lands at
    pub key: String,
}

/// Destination references for each output artifact of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DestinationRefs {
    /// Timecoded transcript (SubRip)
    pub srt: DestinationRef,
    /// Plain text transcript
    pub text: DestinationRef,
    /// Structured segment data
    pub json: DestinationRef,
}

/// A transcription job as delivered from the task queue.
///
/// Immutable once enqueued; the queue may deliver the same job more than
/// once and every copy is structurally identical.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Filename the user uploaded, used in notifications and exports
    pub original_filename: String,

    /// Time-boxed fetchable URL for the input media
    pub input_ref: String,

    /// Where each output artifact must be written
    pub destination_refs: DestinationRefs,

    /// When the producer enqueued the job
    pub sent_timestamp: DateTime<Utc>,

    /// Owning user identity
    pub user_email: String,

    /// Requested input language: a specific code or "auto"
    pub language_code: String,

    /// Whether the job's output should be the English translation
    pub translate: bool,
}

impl Job {
    /// Whether the job asked for automatic language detection.
    pub fn is_auto_language(&self) -> bool {
        self.language_code == LANGUAGE_AUTO
    }

    /// The destination keys as reported in success events.
    pub fn output_keys(&self) -> crate::result::OutputKeys {
        crate::result::OutputKeys {
            srt: self.destination_refs.srt.key.clone(),
            text: self.destination_refs.text.key.clone(),
            json: self.destination_refs.json.key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> &'static str {
        r#"{
            "id": "uploads/user/recording.mp3",
            "originalFilename": "recording.mp3",
            "inputRef": "https://media.example.com/uploads/user/recording.mp3?sig=abc",
            "destinationRefs": {
                "srt": {"url": "https://out.example.com/srt?sig=1", "key": "srt/recording.srt"},
                "text": {"url": "https://out.example.com/txt?sig=2", "key": "text/recording.txt"},
                "json": {"url": "https://out.example.com/json?sig=3", "key": "json/recording.json"}
            },
            "sentTimestamp": "2026-01-01T00:00:00Z",
            "userEmail": "user@example.com",
            "languageCode": "auto",
            "translate": false
        }"#
    }

    #[test]
    fn test_job_deserializes_wire_body() {
        let job: Job = serde_json::from_str(sample_body()).unwrap();
        assert_eq!(job.id.as_str(), "uploads/user/recording.mp3");
        assert_eq!(job.original_filename, "recording.mp3");
        assert_eq!(job.destination_refs.text.key, "text/recording.txt");
        assert_eq!(job.language_code, "auto");
        assert!(job.is_auto_language());
        assert!(!job.translate);
    }

    #[test]
    fn test_job_round_trips_camel_case() {
        let job: Job = serde_json::from_str(sample_body()).unwrap();
        let value = serde_json::to_value(&job).unwrap();
        assert!(value.get("originalFilename").is_some());
        assert!(value.get("inputRef").is_some());
        assert!(value.get("sentTimestamp").is_some());
        assert!(value.get("original_filename").is_none());
    }

    #[test]
    fn test_output_keys_come_from_destination_refs() {
        let job: Job = serde_json::from_str(sample_body()).unwrap();
        let keys = job.output_keys();
        assert_eq!(keys.srt, "srt/recording.srt");
        assert_eq!(keys.text, "text/recording.txt");
        assert_eq!(keys.json, "json/recording.json");
    }

    #[test]
    fn test_job_id_display() {
        let id = JobId::from_string("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }
}
