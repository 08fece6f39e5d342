//! Submission and query paths of the pipeline.
//!
//! [`Dispatcher`] turns an upload into a queued job (validate → store →
//! record → enqueue); [`StatusResolver`] answers polls from the ledger
//! without ever touching in-flight work.

pub mod dispatcher;
pub mod status;

pub use dispatcher::{DispatchError, Dispatcher};
pub use status::{JobStatusView, StatusResolver};
