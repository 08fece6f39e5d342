//! Structured logging of job lifecycle events.
//!
//! Single consumer of the event bus: every lifecycle transition produces
//! one log line with the job id and payload, regardless of which
//! component published it. Keeps lifecycle logging in one place instead
//! of scattered across the dispatcher and workers.

use shelfscan_core::job_events::{EVENT_JOB_DEAD_LETTERED, EVENT_JOB_RETRIED};
use shelfscan_events::JobEvent;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Run the event log loop until the bus closes or `cancel` fires.
pub async fn run(mut rx: broadcast::Receiver<JobEvent>, cancel: CancellationToken) {
    tracing::info!("Job event log started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job event log stopping");
                break;
            }
            received = rx.recv() => {
                match received {
                    Ok(event) => log_event(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Job event log lagged; events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed; job event log stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// Emit one log line for a lifecycle event. Failure-shaped events log at
/// warn, the rest at info.
fn log_event(event: &JobEvent) {
    match event.event_type.as_str() {
        EVENT_JOB_RETRIED | EVENT_JOB_DEAD_LETTERED => {
            tracing::warn!(
                job_id = %event.job_id,
                event_type = %event.event_type,
                payload = %event.payload,
                "Job lifecycle event",
            );
        }
        _ => {
            tracing::info!(
                job_id = %event.job_id,
                event_type = %event.event_type,
                payload = %event.payload,
                "Job lifecycle event",
            );
        }
    }
}
