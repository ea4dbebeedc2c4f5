//! Processing outcome taxonomy.
//!
//! Everything an attempt can produce collapses into one of these shapes
//! at the pipeline boundary; the escalation policy consumes them
//! without looking at the underlying errors.

use hark_models::{FailureKind, OutputKeys};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Fetch the input media over HTTP
    Acquire,
    /// Convert to the canonical mono 16kHz wav
    Normalize,
    /// Extend the lease once the media duration is known
    LeaseExtension,
    /// Run recognition over the wav
    Transcribe,
    /// Second recognition pass emitting English
    Translate,
    /// Upload the artifact set to the destination URLs
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Acquire => "acquire",
            Stage::Normalize => "normalize",
            Stage::LeaseExtension => "lease_extension",
            Stage::Transcribe => "transcribe",
            Stage::Translate => "translate",
            Stage::Upload => "upload",
        }
    }

    /// Whether a failure at this stage is worth another delivery.
    ///
    /// Conversion fails the same way on every host for a given input,
    /// so a normalize failure goes straight to the dead letter queue.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Stage::Normalize)
    }

    /// Which failure kind a failure at this stage reports downstream.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Stage::Acquire => FailureKind::MediaDownload,
            _ => FailureKind::Transcription,
        }
    }
}

/// Terminal shape of one processing attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    /// All stages completed and every artifact was uploaded
    Success {
        output_keys: OutputKeys,
        /// Source language reported in the success event
        language: Option<String>,
        /// The artifact set is an English translation
        translated: bool,
    },
    /// A stage failed; recoverability depends on the stage
    StageFailure { stage: Stage, cause: String },
    /// The delivery itself is unusable (unparseable body)
    FatalFailure { cause: String },
}
