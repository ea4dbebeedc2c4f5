//! Transcript export to Google Drive.
//!
//! This crate provides:
//! - A Drive/Docs client authorized with a caller-supplied OAuth token
//! - A fan-out runner exporting transcript documents and source media
//! - Per-target status folding persisted through the record store

pub mod drive;
pub mod error;
pub mod runner;

pub use drive::DriveClient;
pub use error::{ExportError, ExportResult};
pub use runner::{doc_title, ExportRequest, Exporter, MAX_MEDIA_EXPORT_BYTES};
