//! Export targets and the per-target status array.
//!
//! An export request fans out to N independent targets. The status array
//! keeps one entry per requested target, created in-progress and replaced
//! as each target resolves. `ExportStatusSet` is a pure reducer over that
//! array; persistence happens elsewhere.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of export targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ExportType {
    /// Plain text transcript to a document
    Text,
    /// Timecoded transcript to a document
    Srt,
    /// Original media file
    SourceMedia,
}

impl ExportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Text => "text",
            ExportType::Srt => "srt",
            ExportType::SourceMedia => "source-media",
        }
    }

    /// Whether the target exports a transcript document.
    pub fn is_transcript(&self) -> bool {
        matches!(self, ExportType::Text | ExportType::Srt)
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution state of one export target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ExportState {
    /// The target has not resolved yet
    InProgress,
    /// The target resolved with the created artifact's id
    Success { id: String },
    /// The target resolved with a user-facing message
    Failure { message: String },
}

/// Status of one export target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExportStatus {
    /// Which target this entry tracks
    #[serde(rename = "exportType")]
    pub export_type: ExportType,

    /// Resolution state, flattened into the entry
    #[serde(flatten)]
    pub state: ExportState,
}

impl ExportStatus {
    pub fn in_progress(export_type: ExportType) -> Self {
        Self {
            export_type,
            state: ExportState::InProgress,
        }
    }

    pub fn success(export_type: ExportType, id: impl Into<String>) -> Self {
        Self {
            export_type,
            state: ExportState::Success { id: id.into() },
        }
    }

    pub fn failure(export_type: ExportType, message: impl Into<String>) -> Self {
        Self {
            export_type,
            state: ExportState::Failure {
                message: message.into(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, ExportState::InProgress)
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state, ExportState::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.state, ExportState::Failure { .. })
    }
}

/// Merged view over every entry in a status array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum OverallExportStatus {
    /// Every target succeeded
    Success,
    /// At least one target failed and at least one succeeded
    PartialFailure,
    /// Every target failed
    Failure,
    /// At least one target has not resolved yet
    InProgress,
}

impl OverallExportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallExportStatus::Success => "success",
            OverallExportStatus::PartialFailure => "partial-failure",
            OverallExportStatus::Failure => "failure",
            OverallExportStatus::InProgress => "in-progress",
        }
    }
}

/// Ordered status array keyed by export type, one entry per requested
/// target. Never loses or reorders entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ExportStatusSet(Vec<ExportStatus>);

impl ExportStatusSet {
    /// Create one in-progress entry per requested target, order preserved.
    pub fn initialize(items: &[ExportType]) -> Self {
        Self(items.iter().map(|t| ExportStatus::in_progress(*t)).collect())
    }

    /// Replace the entry whose export type matches the completed status,
    /// leaving all others untouched. Entries with no matching type are a
    /// no-op, so re-applying the same completion is harmless.
    pub fn update(self, completed: ExportStatus) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|s| {
                    if s.export_type == completed.export_type {
                        completed.clone()
                    } else {
                        s
                    }
                })
                .collect(),
        )
    }

    /// Derive the merged view over every entry.
    pub fn overall(&self) -> OverallExportStatus {
        if self.0.iter().any(|s| !s.is_terminal()) {
            return OverallExportStatus::InProgress;
        }
        let successes = self.0.iter().filter(|s| s.is_success()).count();
        if successes == self.0.len() {
            OverallExportStatus::Success
        } else if successes == 0 {
            OverallExportStatus::Failure
        } else {
            OverallExportStatus::PartialFailure
        }
    }

    pub fn statuses(&self) -> &[ExportStatus] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<ExportStatus> {
        self.0
    }
}

impl From<Vec<ExportStatus>> for ExportStatusSet {
    fn from(statuses: Vec<ExportStatus>) -> Self {
        Self(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_preserves_order() {
        let set = ExportStatusSet::initialize(&[
            ExportType::Srt,
            ExportType::Text,
            ExportType::SourceMedia,
        ]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.statuses()[0].export_type, ExportType::Srt);
        assert_eq!(set.statuses()[1].export_type, ExportType::Text);
        assert_eq!(set.statuses()[2].export_type, ExportType::SourceMedia);
        assert!(set.statuses().iter().all(|s| !s.is_terminal()));
    }

    #[test]
    fn test_update_replaces_only_matching_entry() {
        let set = ExportStatusSet::initialize(&[ExportType::Text, ExportType::Srt]);
        let set = set.update(ExportStatus::success(ExportType::Text, "doc-1"));
        assert_eq!(set.len(), 2);
        assert!(set.statuses()[0].is_success());
        assert!(!set.statuses()[1].is_terminal());
    }

    #[test]
    fn test_update_is_idempotent_and_size_preserving() {
        let set = ExportStatusSet::initialize(&[
            ExportType::Text,
            ExportType::Srt,
            ExportType::SourceMedia,
        ]);
        let completed = ExportStatus::failure(ExportType::Srt, "boom");
        let once = set.clone().update(completed.clone());
        let twice = once.clone().update(completed);
        assert_eq!(once, twice);
        assert_eq!(twice.len(), 3);
    }

    #[test]
    fn test_update_with_unrequested_type_changes_nothing() {
        let set = ExportStatusSet::initialize(&[ExportType::Text]);
        let updated = set
            .clone()
            .update(ExportStatus::success(ExportType::SourceMedia, "f-1"));
        assert_eq!(set, updated);
    }

    #[test]
    fn test_overall_mixed_is_partial_failure() {
        let set = ExportStatusSet::from(vec![
            ExportStatus::success(ExportType::Text, "doc-1"),
            ExportStatus::failure(ExportType::Srt, "boom"),
        ]);
        assert_eq!(set.overall(), OverallExportStatus::PartialFailure);
    }

    #[test]
    fn test_overall_all_success() {
        let set = ExportStatusSet::from(vec![
            ExportStatus::success(ExportType::Text, "doc-1"),
            ExportStatus::success(ExportType::Srt, "doc-2"),
        ]);
        assert_eq!(set.overall(), OverallExportStatus::Success);
    }

    #[test]
    fn test_overall_all_failure() {
        let set = ExportStatusSet::from(vec![
            ExportStatus::failure(ExportType::Text, "a"),
            ExportStatus::failure(ExportType::Srt, "b"),
        ]);
        assert_eq!(set.overall(), OverallExportStatus::Failure);
    }

    #[test]
    fn test_overall_any_in_progress_wins() {
        let set = ExportStatusSet::from(vec![
            ExportStatus::in_progress(ExportType::Text),
            ExportStatus::success(ExportType::Srt, "doc-2"),
        ]);
        assert_eq!(set.overall(), OverallExportStatus::InProgress);
    }

    #[test]
    fn test_persisted_array_shape() {
        let set = ExportStatusSet::from(vec![
            ExportStatus::in_progress(ExportType::Text),
            ExportStatus::success(ExportType::Srt, "doc-2"),
            ExportStatus::failure(ExportType::SourceMedia, "too large"),
        ]);
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value[0]["exportType"], "text");
        assert_eq!(value[0]["status"], "in-progress");
        assert_eq!(value[1]["status"], "success");
        assert_eq!(value[1]["id"], "doc-2");
        assert_eq!(value[2]["exportType"], "source-media");
        assert_eq!(value[2]["status"], "failure");
        assert_eq!(value[2]["message"], "too large");

        let back: ExportStatusSet = serde_json::from_value(value).unwrap();
        assert_eq!(back, set);
    }
}
