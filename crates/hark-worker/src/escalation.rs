//! Retry escalation policy.
//!
//! Pure decision over an outcome and the delivery attempt count. The
//! executor performs the queue and publish actions the decision names.

use hark_models::FailureKind;

use crate::outcome::ProcessingOutcome;

/// What the executor should do with the lease and the result event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Delete the lease and publish a success event
    Complete,
    /// Move the raw message to the dead letter queue and publish failure
    DeadLetter { kind: FailureKind },
    /// Release the lease early for redelivery; publish nothing yet
    Redeliver,
    /// Publish failure and leave the lease to the queue's redrive policy
    Exhausted { kind: FailureKind },
    /// Publish failure and delete the lease; retrying cannot help
    Fatal { kind: FailureKind },
}

/// Decide the terminal action for one processing attempt.
///
/// A recoverable failure is released early while attempts remain; once
/// the attempt count reaches the queue's max receive count the lease is
/// left alone so the queue's own redrive policy dead-letters it, never
/// producing a second dead letter copy.
pub fn decide(outcome: &ProcessingOutcome, attempt: u32, max_receive_count: u32) -> Escalation {
    match outcome {
        ProcessingOutcome::Success { .. } => Escalation::Complete,
        ProcessingOutcome::StageFailure { stage, .. } => {
            let kind = stage.failure_kind();
            if !stage.is_recoverable() {
                Escalation::DeadLetter { kind }
            } else if attempt < max_receive_count {
                Escalation::Redeliver
            } else {
                Escalation::Exhausted { kind }
            }
        }
        ProcessingOutcome::FatalFailure { .. } => Escalation::Fatal {
            kind: FailureKind::Transcription,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Stage;
    use hark_models::OutputKeys;

    fn success() -> ProcessingOutcome {
        ProcessingOutcome::Success {
            output_keys: OutputKeys {
                srt: "srt/a.srt".to_string(),
                text: "text/a.txt".to_string(),
                json: "json/a.json".to_string(),
            },
            language: Some("fr".to_string()),
            translated: false,
        }
    }

    fn failed_at(stage: Stage) -> ProcessingOutcome {
        ProcessingOutcome::StageFailure {
            stage,
            cause: "boom".to_string(),
        }
    }

    #[test]
    fn test_success_completes() {
        assert_eq!(decide(&success(), 1, 3), Escalation::Complete);
        assert_eq!(decide(&success(), 3, 3), Escalation::Complete);
    }

    #[test]
    fn test_normalize_failure_dead_letters_on_first_attempt() {
        assert_eq!(
            decide(&failed_at(Stage::Normalize), 1, 3),
            Escalation::DeadLetter {
                kind: FailureKind::Transcription
            }
        );
    }

    #[test]
    fn test_recoverable_failure_redelivers_below_max() {
        assert_eq!(decide(&failed_at(Stage::Acquire), 1, 3), Escalation::Redeliver);
        assert_eq!(decide(&failed_at(Stage::Transcribe), 1, 3), Escalation::Redeliver);
    }

    #[test]
    fn test_boundary_attempt_below_max_still_redelivers() {
        assert_eq!(decide(&failed_at(Stage::Upload), 2, 3), Escalation::Redeliver);
    }

    #[test]
    fn test_exhausted_at_max_publishes_failure() {
        assert_eq!(
            decide(&failed_at(Stage::Acquire), 3, 3),
            Escalation::Exhausted {
                kind: FailureKind::MediaDownload
            }
        );
        assert_eq!(
            decide(&failed_at(Stage::Transcribe), 3, 3),
            Escalation::Exhausted {
                kind: FailureKind::Transcription
            }
        );
    }

    #[test]
    fn test_exhausted_past_max() {
        assert_eq!(
            decide(&failed_at(Stage::Upload), 4, 3),
            Escalation::Exhausted {
                kind: FailureKind::Transcription
            }
        );
    }

    #[test]
    fn test_fatal_deletes_without_consuming_retries() {
        let outcome = ProcessingOutcome::FatalFailure {
            cause: "not json".to_string(),
        };
        assert_eq!(
            decide(&outcome, 1, 3),
            Escalation::Fatal {
                kind: FailureKind::Transcription
            }
        );
    }
}
