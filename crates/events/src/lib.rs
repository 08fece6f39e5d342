//! Shelfscan job lifecycle event bus.
//!
//! In-process publish/subscribe hub backed by `tokio::sync::broadcast`.
//! The dispatcher and worker pool publish a [`JobEvent`] on every job
//! lifecycle transition; the API's background event logger is the
//! in-process consumer. Nothing here pushes to callers -- completion is
//! discovered by polling the status endpoint.

pub mod bus;

pub use bus::{EventBus, JobEvent};
