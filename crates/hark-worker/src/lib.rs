//! Media transcription worker.
//!
//! This crate provides:
//! - Sequential job leasing and execution
//! - Media pipeline: acquire, normalize, transcribe, translate, upload
//! - Retry escalation and dead letter handling
//! - Spot interruption monitoring and scale-in protection
//! - Terminal result publication

pub mod config;
pub mod error;
pub mod escalation;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod outcome;
pub mod pipeline;
pub mod preemption;
pub mod protection;
pub mod publisher;
pub mod transfer;
pub mod translation;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use escalation::{decide, Escalation};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use outcome::{ProcessingOutcome, Stage};
pub use pipeline::MediaPipeline;
pub use preemption::PreemptionMonitor;
pub use protection::ScaleInProtection;
pub use publisher::ResultPublisher;
pub use translation::decide_translation;
