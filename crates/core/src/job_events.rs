//! Event type constants for job lifecycle events.
//!
//! Used by the dispatcher and worker pool when publishing to the event bus,
//! and by the API's background event logger when mapping events to log
//! lines.

/// Job accepted and ledger entry created.
pub const EVENT_JOB_QUEUED: &str = "job.queued";

/// Worker claimed the job and started processing.
pub const EVENT_JOB_STARTED: &str = "job.started";

/// Job completed successfully with a result.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// Processing attempt failed; job re-queued for another attempt.
pub const EVENT_JOB_RETRIED: &str = "job.retried";

/// Job exhausted its retries and was dead-lettered.
pub const EVENT_JOB_DEAD_LETTERED: &str = "job.dead_lettered";
