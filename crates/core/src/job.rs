//! The job record and its state machine.
//!
//! A [`Job`] tracks one submitted bookshelf image end-to-end. All mutation
//! goes through [`Job::apply_transition`], a pure function that enforces
//! the lifecycle invariants; the ledger calls it under its own concurrency
//! discipline and never mutates fields directly.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
///
/// ```text
/// queued -> processing -> complete
///                      -> failed -> queued        (retry)
///                                -> dead_lettered (retries exhausted)
/// failed -> processing                            (redelivered claim)
/// ```
///
/// `complete` and `dead_lettered` are terminal; `queued` is the only
/// initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing,
    Complete,
    Failed,
    DeadLettered,
}

impl JobState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::DeadLettered)
    }

    /// Whether a transition from `self` to `next` is allowed.
    pub fn can_transition(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Failed, Processing)
                | (Processing, Complete)
                | (Processing, Failed)
                | (Failed, Queued)
                | (Failed, DeadLettered)
        )
    }

    /// Lowercase name as used in responses and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
            JobState::DeadLettered => "dead_lettered",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One unit of requested work: a submitted bookshelf image tracked by a
/// unique identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    /// Object-store key of the uploaded image.
    pub object_key: String,
    /// Recognition result. `Some` if and only if `state == Complete`.
    pub result: Option<serde_json::Value>,
    /// Last processing error. `Some` if and only if `state` is `Failed`
    /// or `DeadLettered`.
    pub error: Option<String>,
    /// Number of dequeue-and-process cycles attempted so far.
    pub attempt_count: u32,
    pub submitted_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Job {
    /// Create a fresh job in the `Queued` state.
    pub fn new(id: JobId, object_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Queued,
            object_key: object_key.into(),
            result: None,
            error: None,
            attempt_count: 0,
            submitted_at: now,
            updated_at: now,
        }
    }

    /// Apply a state transition plus its patch, enforcing every lifecycle
    /// invariant. The caller (the ledger) is responsible for the
    /// compare-and-swap check against the expected state; this function
    /// only validates that the transition itself is legal.
    pub fn apply_transition(
        &mut self,
        new_state: JobState,
        patch: JobPatch,
    ) -> Result<(), CoreError> {
        if !self.state.can_transition(new_state) {
            return Err(CoreError::Validation(format!(
                "Illegal job state transition {} -> {}",
                self.state, new_state
            )));
        }

        match new_state {
            JobState::Processing => {
                // Claiming clears any previous attempt's error.
                self.result = None;
                self.error = None;
            }
            JobState::Complete => {
                let result = patch.result.ok_or_else(|| {
                    CoreError::Validation(
                        "Transition to complete requires a result".to_string(),
                    )
                })?;
                self.result = Some(result);
                self.error = None;
            }
            JobState::Failed => {
                let error = patch.error.ok_or_else(|| {
                    CoreError::Validation(
                        "Transition to failed requires an error".to_string(),
                    )
                })?;
                self.error = Some(error);
                self.result = None;
            }
            JobState::Queued => {
                // Retry: the recorded failure is cleared; a later attempt
                // will set its own.
                self.result = None;
                self.error = None;
            }
            JobState::DeadLettered => {
                // Retains the last recorded error (the job arrives here
                // from `Failed`, which always carries one).
                if self.error.is_none() {
                    return Err(CoreError::Validation(
                        "Transition to dead_lettered requires a recorded error".to_string(),
                    ));
                }
            }
        }

        if patch.increment_attempts {
            self.attempt_count += 1;
        }

        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JobPatch
// ---------------------------------------------------------------------------

/// Fields to set alongside a state transition.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    /// Count this transition as the start of a processing attempt.
    pub increment_attempts: bool,
    /// Result payload (transitions into `Complete`).
    pub result: Option<serde_json::Value>,
    /// Error description (transitions into `Failed`).
    pub error: Option<String>,
}

impl JobPatch {
    /// Empty patch: state change only.
    pub fn none() -> Self {
        Self::default()
    }

    /// Patch for a worker claiming the job: counts one attempt.
    pub fn claim() -> Self {
        Self {
            increment_attempts: true,
            ..Self::default()
        }
    }

    /// Patch for a successful attempt.
    pub fn complete(result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            ..Self::default()
        }
    }

    /// Patch for a failed attempt.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// JobDescriptor
// ---------------------------------------------------------------------------

/// The payload carried on the work queue: enough to locate the job record
/// and its stored input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub object_key: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
