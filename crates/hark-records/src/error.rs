//! Records error types.

use thiserror::Error;

/// Result type for record store operations.
pub type RecordsResult<T> = Result<T, RecordsError>;

/// Errors that can occur against the transcript record store.
#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("Failed to configure record store: {0}")]
    ConfigError(String),

    #[error("Put failed: {0}")]
    PutFailed(String),

    #[error("Get failed: {0}")]
    GetFailed(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Malformed record attribute {attribute}: {message}")]
    Malformed { attribute: String, message: String },
}

impl RecordsError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn malformed(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}
