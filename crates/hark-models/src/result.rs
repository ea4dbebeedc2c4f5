//! Terminal result events published to downstream consumers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::Job;

/// Terminal status of one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultStatus {
    /// Transcription completed and all artifacts were uploaded
    Success,
    /// A processing stage failed after the media was acquired
    TranscriptionFailure,
    /// The input media could not be fetched
    MediaDownloadFailure,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Success => "SUCCESS",
            ResultStatus::TranscriptionFailure => "TRANSCRIPTION_FAILURE",
            ResultStatus::MediaDownloadFailure => "MEDIA_DOWNLOAD_FAILURE",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, ResultStatus::Success)
    }
}

/// Which kind of failure a terminal failure event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Processing failed after the media was acquired
    Transcription,
    /// The input media could not be fetched
    MediaDownload,
}

impl From<FailureKind> for ResultStatus {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Transcription => ResultStatus::TranscriptionFailure,
            FailureKind::MediaDownload => ResultStatus::MediaDownloadFailure,
        }
    }
}

/// Object keys of the uploaded artifacts, echoed in success events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OutputKeys {
    /// Timecoded transcript key
    pub srt: String,
    /// Plain text transcript key
    pub text: String,
    /// Structured segment data key
    pub json: String,
}

/// One terminal event per processing attempt.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultEvent {
    /// Job ID the event refers to
    pub id: String,

    /// Terminal status
    pub status: ResultStatus,

    /// Filename the user uploaded
    pub original_filename: String,

    /// Owning user identity
    pub user_email: String,

    /// Language of the source media, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,

    /// Artifact keys, present on success only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_keys: Option<OutputKeys>,
}

impl ResultEvent {
    /// Build a success event for a completed job.
    pub fn success(job: &Job, output_keys: OutputKeys, language_code: Option<String>) -> Self {
        Self {
            id: job.id.to_string(),
            status: ResultStatus::Success,
            original_filename: job.original_filename.clone(),
            user_email: job.user_email.clone(),
            language_code,
            output_keys: Some(output_keys),
        }
    }

    /// Build a failure event for a job whose processing will not complete.
    pub fn failure(job: &Job, kind: FailureKind) -> Self {
        Self {
            id: job.id.to_string(),
            status: kind.into(),
            original_filename: job.original_filename.clone(),
            user_email: job.user_email.clone(),
            language_code: None,
            output_keys: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{DestinationRef, DestinationRefs, JobId};
    use chrono::Utc;

    fn sample_job() -> Job {
        Job {
            id: JobId::from_string("uploads/user/a.mp3"),
            original_filename: "a.mp3".to_string(),
            input_ref: "https://media.example.com/a.mp3".to_string(),
            destination_refs: DestinationRefs {
                srt: DestinationRef {
                    url: "https://out/srt".to_string(),
                    key: "srt/a.srt".to_string(),
                },
                text: DestinationRef {
                    url: "https://out/txt".to_string(),
                    key: "text/a.txt".to_string(),
                },
                json: DestinationRef {
                    url: "https://out/json".to_string(),
                    key: "json/a.json".to_string(),
                },
            },
            sent_timestamp: Utc::now(),
            user_email: "user@example.com".to_string(),
            language_code: "auto".to_string(),
            translate: false,
        }
    }

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(
            serde_json::to_string(&ResultStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
        assert_eq!(
            serde_json::to_string(&ResultStatus::TranscriptionFailure).unwrap(),
            "\"TRANSCRIPTION_FAILURE\""
        );
        assert_eq!(
            serde_json::to_string(&ResultStatus::MediaDownloadFailure).unwrap(),
            "\"MEDIA_DOWNLOAD_FAILURE\""
        );
    }

    #[test]
    fn test_success_event_carries_keys_and_language() {
        let job = sample_job();
        let event = ResultEvent::success(&job, job.output_keys(), Some("fr".to_string()));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "SUCCESS");
        assert_eq!(value["languageCode"], "fr");
        assert_eq!(value["outputKeys"]["srt"], "srt/a.srt");
        assert_eq!(value["userEmail"], "user@example.com");
    }

    #[test]
    fn test_failure_event_omits_optional_fields() {
        let job = sample_job();
        let event = ResultEvent::failure(&job, FailureKind::MediaDownload);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "MEDIA_DOWNLOAD_FAILURE");
        assert!(value.get("languageCode").is_none());
        assert!(value.get("outputKeys").is_none());
    }
}
