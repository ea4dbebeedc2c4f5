//! DynamoDB transcript record store.
//!
//! One item per completed transcription, keyed by job id, carrying the
//! output artifact keys and the per-target export status array.

pub mod error;
pub mod item;
pub mod metrics;
pub mod repo;

pub use error::{RecordsError, RecordsResult};
pub use item::TranscriptRecord;
pub use repo::{RecordsConfig, TranscriptStore};
