//! The submission path.

use std::sync::Arc;

use serde_json::json;
use shelfscan_core::job_events::EVENT_JOB_QUEUED;
use shelfscan_core::{media, CoreError, Job, JobDescriptor, JobId};
use shelfscan_events::{EventBus, JobEvent};
use shelfscan_ledger::{JobLedger, LedgerError};
use shelfscan_queue::{QueueError, WorkQueue};
use shelfscan_store::{ObjectStore, StoreError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Submission-time failures. All of these fail the request synchronously;
/// none of them leave a job behind.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Bad content type or empty upload.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// The object store rejected the image; no ledger entry was created.
    #[error("Failed to store image: {0}")]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Validates uploads, persists them, and hands the work off to the queue.
pub struct Dispatcher {
    ledger: Arc<dyn JobLedger>,
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn ObjectStore>,
    events: Arc<EventBus>,
    allowed_content_types: Vec<String>,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn JobLedger>,
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn ObjectStore>,
        events: Arc<EventBus>,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            ledger,
            queue,
            store,
            events,
            allowed_content_types,
        }
    }

    /// Accept an upload and return the queued job immediately; processing
    /// happens asynchronously.
    ///
    /// The image is stored before the ledger entry is created, so a
    /// storage failure never leaves a `Queued` job pointing at a missing
    /// object.
    pub async fn submit(&self, image: &[u8], content_type: &str) -> Result<Job, DispatchError> {
        media::validate_content_type(content_type, &self.allowed_content_types)?;
        if image.is_empty() {
            return Err(CoreError::Validation("Empty image upload".to_string()).into());
        }

        let job_id = JobId::new();
        let object_key = media::object_key(job_id, content_type);

        self.store.put(&object_key, image).await?;
        let job = self.ledger.create(job_id, &object_key).await?;
        self.queue
            .enqueue(JobDescriptor {
                job_id,
                object_key: object_key.clone(),
            })
            .await?;

        tracing::info!(
            job_id = %job_id,
            object_key = %object_key,
            content_type,
            size = image.len(),
            "Job submitted",
        );
        self.events.publish(
            JobEvent::new(EVENT_JOB_QUEUED, job_id).with_payload(json!({
                "content_type": content_type,
                "size": image.len(),
            })),
        );

        Ok(job)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use shelfscan_core::JobState;
    use shelfscan_ledger::MemoryLedger;
    use shelfscan_queue::MemoryQueue;
    use shelfscan_store::MemoryStore;

    use super::*;

    /// Object store that is always down.
    struct DownStore;

    #[async_trait::async_trait]
    impl ObjectStore for DownStore {
        async fn put(&self, _key: &str, _bytes: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("disk on fire".to_string()))
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
            Err(StoreError::NotFound(key.to_string()))
        }
    }

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        queue: Arc<MemoryQueue>,
        store: Arc<MemoryStore>,
        dispatcher: Dispatcher,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let queue = Arc::new(MemoryQueue::default());
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&ledger) as Arc<dyn JobLedger>,
            Arc::clone(&queue) as Arc<dyn WorkQueue>,
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::new(EventBus::default()),
            vec!["image/jpeg".to_string(), "image/png".to_string()],
        );
        Fixture {
            ledger,
            queue,
            store,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn valid_submission_stores_records_and_enqueues() {
        let f = fixture();
        let job = f.dispatcher.submit(b"0123456789", "image/jpeg").await.unwrap();

        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.attempt_count, 0);

        // Object stored under the derived key.
        assert_eq!(f.store.get(&job.object_key).await.unwrap(), b"0123456789");

        // Ledger agrees with the returned record.
        let from_ledger = f.ledger.get(job.id).await.unwrap();
        assert_eq!(from_ledger.state, JobState::Queued);

        // Exactly one descriptor is waiting for a worker.
        assert_eq!(f.queue.backlog().await, 1);
    }

    #[tokio::test]
    async fn unsupported_content_type_is_rejected_with_no_side_effects() {
        let f = fixture();
        let err = f.dispatcher.submit(b"plain text", "text/plain").await.unwrap_err();

        assert_matches!(
            err,
            DispatchError::Invalid(CoreError::UnsupportedMediaType(_))
        );
        assert!(f.ledger.is_empty().await);
        assert!(f.store.is_empty().await);
        assert_eq!(f.queue.backlog().await, 0);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let f = fixture();
        let err = f.dispatcher.submit(b"", "image/png").await.unwrap_err();
        assert_matches!(err, DispatchError::Invalid(CoreError::Validation(_)));
        assert!(f.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn storage_failure_creates_no_job() {
        let ledger = Arc::new(MemoryLedger::new());
        let queue = Arc::new(MemoryQueue::default());
        let dispatcher = Dispatcher::new(
            Arc::clone(&ledger) as Arc<dyn JobLedger>,
            Arc::clone(&queue) as Arc<dyn WorkQueue>,
            Arc::new(DownStore),
            Arc::new(EventBus::default()),
            vec!["image/jpeg".to_string()],
        );

        let err = dispatcher.submit(b"img", "image/jpeg").await.unwrap_err();
        assert_matches!(err, DispatchError::Storage(StoreError::Unavailable(_)));

        // Store-then-record ordering: nothing was recorded or enqueued.
        assert!(ledger.is_empty().await);
        assert_eq!(queue.backlog().await, 0);
    }

    #[tokio::test]
    async fn submission_publishes_a_queued_event() {
        let ledger = Arc::new(MemoryLedger::new());
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let dispatcher = Dispatcher::new(
            ledger as Arc<dyn JobLedger>,
            Arc::new(MemoryQueue::default()),
            Arc::new(MemoryStore::new()),
            Arc::clone(&events),
            vec!["image/png".to_string()],
        );

        let job = dispatcher.submit(b"img", "image/png").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EVENT_JOB_QUEUED);
        assert_eq!(event.job_id, job.id);
        assert_eq!(event.payload["content_type"], "image/png");
    }
}
