//! S3 media bucket client.
//!
//! This crate provides:
//! - Transcript artifact reads (text and raw bytes)
//! - Source media download for export
//! - Object size lookup for export size ceilings
//! - NotFound classification for expired-object detection

pub mod client;
pub mod error;

pub use client::{StorageClient, StorageConfig};
pub use error::{StorageError, StorageResult};
