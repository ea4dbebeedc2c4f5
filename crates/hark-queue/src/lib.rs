//! SQS job queue client.
//!
//! This crate provides:
//! - Non-blocking single-message leasing with delivery attempt counts
//! - Lease extension, early release, and deletion
//! - Dead-letter moves (send to secondary queue, delete from primary)
//! - Plain message sends for result publishing

pub mod error;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use queue::{Delivery, JobQueue, Lease, QueueConfig};
