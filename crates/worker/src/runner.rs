//! The per-worker dequeue/process/ack loop.

use serde_json::json;
use shelfscan_core::job_events::{
    EVENT_JOB_COMPLETED, EVENT_JOB_DEAD_LETTERED, EVENT_JOB_RETRIED, EVENT_JOB_STARTED,
};
use shelfscan_core::{Job, JobId, JobPatch, JobState};
use shelfscan_events::JobEvent;
use shelfscan_ledger::LedgerError;
use shelfscan_queue::{AckToken, Delivery};
use tokio_util::sync::CancellationToken;

use crate::WorkerContext;

/// Run one worker loop until the cancellation token fires.
pub(crate) async fn run_worker(worker_id: usize, ctx: WorkerContext, cancel: CancellationToken) {
    tracing::info!(worker_id, "Worker started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(worker_id, "Worker shutting down");
                break;
            }
            delivery = ctx.queue.dequeue() => {
                match delivery {
                    Ok(delivery) => handle_delivery(worker_id, &ctx, delivery).await,
                    Err(e) => {
                        tracing::error!(worker_id, error = %e, "Dequeue failed");
                    }
                }
            }
        }
    }
}

/// Process one queue delivery end to end.
///
/// The routine is idempotent under redelivery: the ledger's
/// compare-and-swap claim decides who actually processes, so duplicate
/// deliveries of finished work are acknowledged away and a delivery that
/// loses a claim race is nacked for a later re-check.
pub(crate) async fn handle_delivery(worker_id: usize, ctx: &WorkerContext, delivery: Delivery) {
    let job_id = delivery.descriptor.job_id;
    let token = delivery.token;

    let job = match ctx.ledger.get(job_id).await {
        Ok(job) => job,
        Err(LedgerError::NotFound(_)) => {
            // A descriptor with no ledger record cannot be processed and
            // will never become processable; drop it.
            tracing::warn!(worker_id, job_id = %job_id, "Delivery for unknown job; dropping");
            ack(ctx, token, job_id).await;
            return;
        }
        Err(e) => {
            tracing::error!(worker_id, job_id = %job_id, error = %e, "Ledger read failed");
            nack(ctx, token, job_id).await;
            return;
        }
    };

    let claimed = match job.state {
        JobState::Complete | JobState::DeadLettered => {
            tracing::debug!(
                worker_id,
                job_id = %job_id,
                state = %job.state,
                delivery_count = delivery.delivery_count,
                "Duplicate delivery of finished job; acknowledging",
            );
            ack(ctx, token, job_id).await;
            return;
        }
        JobState::Processing => {
            // Another worker holds the claim. Nack rather than ack: if
            // that worker dies, a later redelivery will find the job in a
            // claimable or terminal state.
            tracing::debug!(worker_id, job_id = %job_id, "Job already claimed; backing off");
            nack(ctx, token, job_id).await;
            return;
        }
        expected @ (JobState::Queued | JobState::Failed) => {
            match ctx
                .ledger
                .transition(job_id, expected, JobState::Processing, JobPatch::claim())
                .await
            {
                Ok(job) => job,
                Err(LedgerError::Conflict { actual, .. }) => {
                    tracing::debug!(
                        worker_id,
                        job_id = %job_id,
                        actual = %actual,
                        "Lost claim race; backing off",
                    );
                    nack(ctx, token, job_id).await;
                    return;
                }
                Err(e) => {
                    tracing::error!(worker_id, job_id = %job_id, error = %e, "Claim failed");
                    nack(ctx, token, job_id).await;
                    return;
                }
            }
        }
    };

    tracing::info!(
        worker_id,
        job_id = %job_id,
        attempt_count = claimed.attempt_count,
        delivery_count = delivery.delivery_count,
        "Processing job",
    );
    ctx.events.publish(
        JobEvent::new(EVENT_JOB_STARTED, job_id)
            .with_payload(json!({"attempt_count": claimed.attempt_count})),
    );

    let image = match ctx.store.get(&delivery.descriptor.object_key).await {
        Ok(bytes) => bytes,
        Err(e) => {
            record_failure(
                worker_id,
                ctx,
                &delivery,
                &claimed,
                format!("Image fetch failed: {e}"),
            )
            .await;
            return;
        }
    };

    let outcome =
        tokio::time::timeout(ctx.config.process_timeout, ctx.recognizer.process(&image)).await;

    match outcome {
        Ok(Ok(result)) => complete(worker_id, ctx, &delivery, result).await,
        Ok(Err(e)) => {
            record_failure(
                worker_id,
                ctx,
                &delivery,
                &claimed,
                format!("Recognition failed: {e}"),
            )
            .await;
        }
        Err(_) => {
            record_failure(
                worker_id,
                ctx,
                &delivery,
                &claimed,
                format!(
                    "Recognition timed out after {}s",
                    ctx.config.process_timeout.as_secs()
                ),
            )
            .await;
        }
    }
}

/// Settle a successful attempt.
async fn complete(
    worker_id: usize,
    ctx: &WorkerContext,
    delivery: &Delivery,
    result: serde_json::Value,
) {
    let job_id = delivery.descriptor.job_id;
    match ctx
        .ledger
        .transition(
            job_id,
            JobState::Processing,
            JobState::Complete,
            JobPatch::complete(result),
        )
        .await
    {
        Ok(done) => {
            tracing::info!(
                worker_id,
                job_id = %job_id,
                attempt_count = done.attempt_count,
                "Job completed",
            );
            ctx.events.publish(
                JobEvent::new(EVENT_JOB_COMPLETED, job_id)
                    .with_payload(json!({"attempt_count": done.attempt_count})),
            );
            ack(ctx, delivery.token, job_id).await;
        }
        Err(LedgerError::Conflict { actual, .. }) => {
            // Another delivery settled the job while we were processing.
            // Our result is discarded; the ledger record wins.
            tracing::warn!(
                worker_id,
                job_id = %job_id,
                actual = %actual,
                "Completion lost to a concurrent transition; discarding result",
            );
            ack(ctx, delivery.token, job_id).await;
        }
        Err(e) => {
            tracing::error!(worker_id, job_id = %job_id, error = %e, "Completion write failed");
            nack(ctx, delivery.token, job_id).await;
        }
    }
}

/// Settle a failed attempt: record the error, then either re-queue for
/// another attempt or dead-letter the job.
async fn record_failure(
    worker_id: usize,
    ctx: &WorkerContext,
    delivery: &Delivery,
    claimed: &Job,
    error: String,
) {
    let job_id = delivery.descriptor.job_id;
    tracing::warn!(
        worker_id,
        job_id = %job_id,
        attempt_count = claimed.attempt_count,
        error = %error,
        "Processing attempt failed",
    );

    let failed = match ctx
        .ledger
        .transition(
            job_id,
            JobState::Processing,
            JobState::Failed,
            JobPatch::fail(error),
        )
        .await
    {
        Ok(job) => job,
        Err(LedgerError::Conflict { actual, .. }) => {
            tracing::warn!(
                worker_id,
                job_id = %job_id,
                actual = %actual,
                "Failure record lost to a concurrent transition",
            );
            ack(ctx, delivery.token, job_id).await;
            return;
        }
        Err(e) => {
            tracing::error!(worker_id, job_id = %job_id, error = %e, "Failure write failed");
            nack(ctx, delivery.token, job_id).await;
            return;
        }
    };

    if failed.attempt_count < ctx.config.max_retries {
        match ctx
            .ledger
            .transition(job_id, JobState::Failed, JobState::Queued, JobPatch::none())
            .await
        {
            Ok(_) => {
                if let Err(e) = ctx.queue.enqueue(delivery.descriptor.clone()).await {
                    tracing::error!(worker_id, job_id = %job_id, error = %e, "Re-enqueue failed");
                }
                tracing::info!(
                    worker_id,
                    job_id = %job_id,
                    attempt_count = failed.attempt_count,
                    max_retries = ctx.config.max_retries,
                    "Job re-queued for retry",
                );
                ctx.events.publish(
                    JobEvent::new(EVENT_JOB_RETRIED, job_id).with_payload(json!({
                        "attempt_count": failed.attempt_count,
                        "error": failed.error,
                    })),
                );
            }
            Err(LedgerError::Conflict { actual, .. }) => {
                tracing::warn!(
                    worker_id,
                    job_id = %job_id,
                    actual = %actual,
                    "Retry re-queue lost to a concurrent transition",
                );
            }
            Err(e) => {
                tracing::error!(worker_id, job_id = %job_id, error = %e, "Retry re-queue failed");
            }
        }
        ack(ctx, delivery.token, job_id).await;
    } else {
        match ctx
            .ledger
            .transition(
                job_id,
                JobState::Failed,
                JobState::DeadLettered,
                JobPatch::none(),
            )
            .await
        {
            Ok(dead) => {
                tracing::warn!(
                    worker_id,
                    job_id = %job_id,
                    attempt_count = dead.attempt_count,
                    error = dead.error.as_deref().unwrap_or(""),
                    "Job dead-lettered; retries exhausted",
                );
                ctx.events.publish(
                    JobEvent::new(EVENT_JOB_DEAD_LETTERED, job_id).with_payload(json!({
                        "attempt_count": dead.attempt_count,
                        "error": dead.error,
                    })),
                );
            }
            Err(LedgerError::Conflict { actual, .. }) => {
                tracing::warn!(
                    worker_id,
                    job_id = %job_id,
                    actual = %actual,
                    "Dead-letter lost to a concurrent transition",
                );
            }
            Err(e) => {
                tracing::error!(worker_id, job_id = %job_id, error = %e, "Dead-letter write failed");
            }
        }
        ack(ctx, delivery.token, job_id).await;
    }
}

/// Acknowledge a delivery, logging (not propagating) token expiry -- by the
/// time an ack fails the job's fate is already recorded in the ledger.
async fn ack(ctx: &WorkerContext, token: AckToken, job_id: JobId) {
    if let Err(e) = ctx.queue.ack(token).await {
        tracing::warn!(job_id = %job_id, error = %e, "Ack failed; delivery already reclaimed");
    }
}

/// Return a delivery to the queue for later redelivery.
async fn nack(ctx: &WorkerContext, token: AckToken, job_id: JobId) {
    if let Err(e) = ctx.queue.nack(token).await {
        tracing::warn!(job_id = %job_id, error = %e, "Nack failed; delivery already reclaimed");
    }
}
