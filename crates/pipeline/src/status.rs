//! The query path.

use std::sync::Arc;

use serde::Serialize;
use shelfscan_core::{Job, JobId, JobState};
use shelfscan_ledger::{JobLedger, LedgerError};

/// What a poller sees: current state plus the terminal payload, when
/// there is one.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Job> for JobStatusView {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            state: job.state,
            result: job.result,
            error: job.error,
        }
    }
}

/// Read-only view over the ledger. Never triggers processing side
/// effects; safe to call arbitrarily often.
pub struct StatusResolver {
    ledger: Arc<dyn JobLedger>,
}

impl StatusResolver {
    pub fn new(ledger: Arc<dyn JobLedger>) -> Self {
        Self { ledger }
    }

    pub async fn status(&self, job_id: JobId) -> Result<JobStatusView, LedgerError> {
        self.ledger.get(job_id).await.map(JobStatusView::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
