//! At-least-once work queue for job descriptors.
//!
//! A dequeued delivery stays invisible to other consumers for the
//! visibility timeout; if it is not acknowledged within that window it
//! becomes deliverable again, so a crashed consumer costs a redelivery,
//! not a lost job. Consumers must therefore be idempotent with respect to
//! redelivery -- in this pipeline that guard is the ledger's
//! compare-and-swap claim, not the queue.
//!
//! No ordering is guaranteed across distinct jobs.

pub mod memory;

use std::time::Duration;

use shelfscan_core::JobDescriptor;

pub use memory::MemoryQueue;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The ack token does not correspond to an in-flight delivery. Happens
    /// when the visibility timeout already expired and the item was
    /// reclaimed for redelivery.
    #[error("Unknown or expired ack token")]
    UnknownToken,
}

// ---------------------------------------------------------------------------
// Delivery types
// ---------------------------------------------------------------------------

/// Opaque handle identifying one in-flight delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AckToken(pub(crate) u64);

/// One delivery of a job descriptor to a consumer.
#[derive(Debug)]
pub struct Delivery {
    pub descriptor: JobDescriptor,
    pub token: AckToken,
    /// 1 for the first delivery, incremented on every redelivery.
    pub delivery_count: u32,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Delivery timing knobs.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// How long a dequeued-but-unacknowledged delivery stays hidden before
    /// it becomes deliverable again. Must exceed the expected worst-case
    /// processing duration to avoid spurious duplicate work (the pipeline
    /// stays correct either way).
    pub visibility_timeout: Duration,
    /// How long a nacked item stays hidden before redelivery. Keeps a
    /// consumer that repeatedly nacks the same item from busy-looping.
    pub redeliver_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(60),
            redeliver_delay: Duration::from_millis(1000),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkQueue
// ---------------------------------------------------------------------------

/// At-least-once delivery channel carrying job descriptors from submission
/// to workers.
#[async_trait::async_trait]
pub trait WorkQueue: Send + Sync {
    /// Make a descriptor deliverable immediately.
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<(), QueueError>;

    /// Wait until a descriptor is visible and take exclusive delivery of
    /// it for the visibility timeout. Blocks indefinitely when the queue
    /// is empty; callers that need to stop select against their own
    /// cancellation signal.
    async fn dequeue(&self) -> Result<Delivery, QueueError>;

    /// Permanently remove an in-flight delivery.
    async fn ack(&self, token: AckToken) -> Result<(), QueueError>;

    /// Give up an in-flight delivery; it becomes visible again after the
    /// redelivery delay.
    async fn nack(&self, token: AckToken) -> Result<(), QueueError>;
}
