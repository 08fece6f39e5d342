//! Shelfscan domain core.
//!
//! Pure types and functions shared by every other crate in the workspace:
//! the job record and its state machine, content-type validation for
//! uploads, the error taxonomy, and lifecycle event name constants.
//!
//! This crate has no I/O and no internal dependencies so that the ledger,
//! queue, worker, and API crates can all build on it without cycles.

pub mod error;
pub mod job;
pub mod job_events;
pub mod media;
pub mod types;

pub use error::CoreError;
pub use job::{Job, JobDescriptor, JobPatch, JobState};
pub use types::{JobId, Timestamp};
