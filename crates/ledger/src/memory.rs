//! In-memory job ledger.

use std::collections::HashMap;

use shelfscan_core::{Job, JobId, JobPatch, JobState};
use tokio::sync::RwLock;

use crate::{JobLedger, LedgerError};

/// Process-local [`JobLedger`] over a lock-guarded map.
///
/// All transitions are serialized behind the write lock, which is strictly
/// stronger than the required per-id linearizability; reads proceed
/// concurrently under the read lock.
#[derive(Default)]
pub struct MemoryLedger {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of job records. Test helper.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl JobLedger for MemoryLedger {
    async fn create(&self, job_id: JobId, object_key: &str) -> Result<Job, LedgerError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job_id) {
            return Err(LedgerError::Duplicate(job_id));
        }
        let job = Job::new(job_id, object_key);
        jobs.insert(job_id, job.clone());
        Ok(job)
    }

    async fn get(&self, job_id: JobId) -> Result<Job, LedgerError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(LedgerError::NotFound(job_id))
    }

    async fn transition(
        &self,
        job_id: JobId,
        expected: JobState,
        new_state: JobState,
        patch: JobPatch,
    ) -> Result<Job, LedgerError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(LedgerError::NotFound(job_id))?;

        if job.state != expected {
            return Err(LedgerError::Conflict {
                id: job_id,
                expected,
                actual: job.state,
            });
        }

        // Validate against a copy so a rejected patch leaves the record
        // untouched.
        let mut updated = job.clone();
        updated.apply_transition(new_state, patch)?;
        *job = updated.clone();

        tracing::debug!(
            job_id = %job_id,
            from = %expected,
            to = %new_state,
            attempt_count = updated.attempt_count,
            "Job state transition",
        );
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    // -- create / get ---------------------------------------------------------

    #[tokio::test]
    async fn create_starts_jobs_queued() {
        let ledger = MemoryLedger::new();
        let id = JobId::new();
        let job = ledger.create(id, "shelves/a.jpg").await.unwrap();

        assert_eq!(job.id, id);
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempt_count, 0);
        assert_eq!(job.object_key, "shelves/a.jpg");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let ledger = MemoryLedger::new();
        let id = JobId::new();
        ledger.create(id, "shelves/a.jpg").await.unwrap();

        let err = ledger.create(id, "shelves/b.jpg").await.unwrap_err();
        assert_matches!(err, LedgerError::Duplicate(dup) if dup == id);
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn get_of_unknown_id_is_not_found() {
        let ledger = MemoryLedger::new();
        let err = ledger.get(JobId::new()).await.unwrap_err();
        assert_matches!(err, LedgerError::NotFound(_));
    }

    // -- transition -----------------------------------------------------------

    #[tokio::test]
    async fn transition_applies_patch_and_returns_updated_job() {
        let ledger = MemoryLedger::new();
        let id = JobId::new();
        ledger.create(id, "shelves/a.jpg").await.unwrap();

        let claimed = ledger
            .transition(id, JobState::Queued, JobState::Processing, JobPatch::claim())
            .await
            .unwrap();
        assert_eq!(claimed.state, JobState::Processing);
        assert_eq!(claimed.attempt_count, 1);

        let done = ledger
            .transition(
                id,
                JobState::Processing,
                JobState::Complete,
                JobPatch::complete(json!({"books": []})),
            )
            .await
            .unwrap();
        assert_eq!(done.state, JobState::Complete);
        assert_eq!(done.result, Some(json!({"books": []})));
    }

    #[tokio::test]
    async fn transition_conflict_reports_the_observed_state() {
        let ledger = MemoryLedger::new();
        let id = JobId::new();
        ledger.create(id, "shelves/a.jpg").await.unwrap();

        let err = ledger
            .transition(
                id,
                JobState::Processing,
                JobState::Complete,
                JobPatch::complete(json!({})),
            )
            .await
            .unwrap_err();
        assert_matches!(
            err,
            LedgerError::Conflict {
                expected: JobState::Processing,
                actual: JobState::Queued,
                ..
            }
        );

        // The record is untouched.
        let job = ledger.get(id).await.unwrap();
        assert_eq!(job.state, JobState::Queued);
    }

    #[tokio::test]
    async fn rejected_patch_leaves_the_record_untouched() {
        let ledger = MemoryLedger::new();
        let id = JobId::new();
        ledger.create(id, "shelves/a.jpg").await.unwrap();
        ledger
            .transition(id, JobState::Queued, JobState::Processing, JobPatch::claim())
            .await
            .unwrap();

        // Completing without a result is invalid.
        let err = ledger
            .transition(id, JobState::Processing, JobState::Complete, JobPatch::none())
            .await
            .unwrap_err();
        assert_matches!(err, LedgerError::Invalid(_));

        let job = ledger.get(id).await.unwrap();
        assert_eq!(job.state, JobState::Processing);
        assert_eq!(job.attempt_count, 1);
    }

    #[tokio::test]
    async fn transition_of_unknown_id_is_not_found() {
        let ledger = MemoryLedger::new();
        let err = ledger
            .transition(
                JobId::new(),
                JobState::Queued,
                JobState::Processing,
                JobPatch::claim(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, LedgerError::NotFound(_));
    }

    // -- racing claims --------------------------------------------------------

    #[tokio::test]
    async fn exactly_one_of_two_racing_claims_succeeds() {
        let ledger = Arc::new(MemoryLedger::new());
        let id = JobId::new();
        ledger.create(id, "shelves/a.jpg").await.unwrap();

        let claim = |ledger: Arc<MemoryLedger>| async move {
            ledger
                .transition(id, JobState::Queued, JobState::Processing, JobPatch::claim())
                .await
        };

        let (a, b) = tokio::join!(
            tokio::spawn(claim(Arc::clone(&ledger))),
            tokio::spawn(claim(Arc::clone(&ledger))),
        );
        let results = [a.unwrap(), b.unwrap()];

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one racing claim must win");

        let loss = results.iter().find(|r| r.is_err()).unwrap();
        assert_matches!(
            loss.as_ref().unwrap_err(),
            LedgerError::Conflict {
                actual: JobState::Processing,
                ..
            }
        );

        // The attempt was counted once, not twice.
        assert_eq!(ledger.get(id).await.unwrap().attempt_count, 1);
    }
}
