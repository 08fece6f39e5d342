//! The job ledger: source of truth for job state.
//!
//! Every job has exactly one record, created at submission and mutated
//! only through [`JobLedger::transition`], a compare-and-swap on the job's
//! state. The CAS is what makes redelivered queue items safe: of two
//! workers holding the same job, only one claim can succeed.

pub mod memory;

use shelfscan_core::{CoreError, Job, JobId, JobPatch, JobState};

pub use memory::MemoryLedger;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// `create` was called with an id that already has a record.
    #[error("Job {0} already exists")]
    Duplicate(JobId),

    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The compare-and-swap failed: the job was not in the expected state.
    /// Carries the observed state so callers can route duplicate
    /// deliveries without a second read.
    #[error("Job {id} is {actual}, expected {expected}")]
    Conflict {
        id: JobId,
        expected: JobState,
        actual: JobState,
    },

    /// The transition itself violates the job lifecycle (illegal edge,
    /// missing result/error).
    #[error(transparent)]
    Invalid(#[from] CoreError),
}

// ---------------------------------------------------------------------------
// JobLedger
// ---------------------------------------------------------------------------

/// Durable mapping from job identifier to job record.
///
/// `transition` is linearizable per job id; transitions on different ids
/// must not interfere with each other.
#[async_trait::async_trait]
pub trait JobLedger: Send + Sync {
    /// Create the record for a freshly submitted job in the `Queued`
    /// state.
    async fn create(&self, job_id: JobId, object_key: &str) -> Result<Job, LedgerError>;

    /// Read a job record.
    async fn get(&self, job_id: JobId) -> Result<Job, LedgerError>;

    /// Atomically move a job from `expected` to `new_state`, applying the
    /// patch. Fails with [`LedgerError::Conflict`] when the current state
    /// differs from `expected`; the record is untouched in that case.
    async fn transition(
        &self,
        job_id: JobId,
        expected: JobState,
        new_state: JobState,
        patch: JobPatch,
    ) -> Result<Job, LedgerError>;
}
