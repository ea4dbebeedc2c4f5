//! Shared data models for the hark transcription service.
//!
//! This crate provides Serde-serializable types for:
//! - Transcription job messages consumed from the task queue
//! - Terminal result events published to downstream consumers
//! - Export targets and the per-target status array

pub mod export;
pub mod job;
pub mod result;

// Re-export common types
pub use export::{ExportState, ExportStatus, ExportStatusSet, ExportType, OverallExportStatus};
pub use job::{DestinationRef, DestinationRefs, Job, JobId, LANGUAGE_AUTO, LANGUAGE_ENGLISH};
pub use result::{FailureKind, OutputKeys, ResultEvent, ResultStatus};
