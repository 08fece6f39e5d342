//! The worker pool: consumes queue deliveries, runs recognition, and
//! settles job state in the ledger.
//!
//! Each worker runs an independent dequeue/process/ack loop. Workers share
//! no state with each other beyond the ledger and the queue; the ledger's
//! compare-and-swap claim is what makes at-least-once redelivery safe.

pub mod pool;

mod runner;

use std::sync::Arc;
use std::time::Duration;

use shelfscan_events::EventBus;
use shelfscan_ledger::JobLedger;
use shelfscan_ocr::Recognizer;
use shelfscan_queue::WorkQueue;
use shelfscan_store::ObjectStore;

pub use pool::WorkerPool;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Worker pool tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent worker loops.
    pub concurrency: usize,
    /// Total processing attempts before a job is dead-lettered.
    pub max_retries: u32,
    /// Upper bound on one recognition invocation. Keeps a stuck external
    /// call from outliving the queue's visibility timeout unobserved.
    pub process_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 3,
            process_timeout: Duration::from_secs(45),
        }
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a worker loop needs, cheaply cloneable into each task.
#[derive(Clone)]
pub struct WorkerContext {
    pub ledger: Arc<dyn JobLedger>,
    pub queue: Arc<dyn WorkQueue>,
    pub store: Arc<dyn ObjectStore>,
    pub recognizer: Arc<dyn Recognizer>,
    pub events: Arc<EventBus>,
    pub config: WorkerConfig,
}
