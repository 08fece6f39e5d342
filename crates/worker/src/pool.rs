//! Worker pool lifecycle: spawn N loops, drain them on shutdown.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::runner::run_worker;
use crate::WorkerContext;

/// How long shutdown waits for each worker before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A running pool of worker loops.
pub struct WorkerPool {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.concurrency` worker loops sharing the context.
    pub fn start(ctx: WorkerContext) -> Self {
        let cancel = CancellationToken::new();
        let handles = (0..ctx.config.concurrency)
            .map(|worker_id| {
                let ctx = ctx.clone();
                let cancel = cancel.child_token();
                tokio::spawn(run_worker(worker_id, ctx, cancel))
            })
            .collect::<Vec<_>>();

        tracing::info!(concurrency = handles.len(), "Worker pool started");
        Self { cancel, handles }
    }

    /// Stop all workers and wait for them to finish their current
    /// delivery, up to a grace period each.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down worker pool");
        self.cancel.cancel();

        for (worker_id, mut handle) in self.handles.into_iter().enumerate() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await.is_err() {
                tracing::warn!(worker_id, "Worker did not stop in time; aborting");
                handle.abort();
            }
        }
        tracing::info!("Worker pool shut down");
    }
}
