//! Export error types.

use thiserror::Error;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while exporting transcripts.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Transcript record not found: {0}")]
    RecordNotFound(String),

    #[error("Drive request failed: {0}")]
    DriveRequest(String),

    #[error("Drive returned {status}: {body}")]
    DriveStatus { status: u16, body: String },

    #[error("Storage error: {0}")]
    Storage(#[from] hark_storage::StorageError),

    #[error("Record store error: {0}")]
    Records(#[from] hark_records::RecordsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    pub fn drive_request(msg: impl Into<String>) -> Self {
        Self::DriveRequest(msg.into())
    }
}
