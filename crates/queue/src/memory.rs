//! In-memory work queue with visibility-timeout redelivery.

use std::collections::{HashMap, VecDeque};

use shelfscan_core::JobDescriptor;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::{AckToken, Delivery, QueueConfig, QueueError, WorkQueue};

/// An item waiting to become (or already) visible.
#[derive(Debug)]
struct PendingItem {
    descriptor: JobDescriptor,
    not_before: Instant,
    delivery_count: u32,
}

/// An item exclusively delivered to a consumer, hidden until `deadline`.
#[derive(Debug)]
struct InFlightItem {
    descriptor: JobDescriptor,
    deadline: Instant,
    delivery_count: u32,
}

#[derive(Default)]
struct Inner {
    /// Visible items, delivered FIFO.
    ready: VecDeque<PendingItem>,
    /// Nacked items waiting out their redelivery delay.
    delayed: Vec<PendingItem>,
    /// Delivered-but-unacknowledged items keyed by ack token.
    in_flight: HashMap<AckToken, InFlightItem>,
    next_token: u64,
}

impl Inner {
    /// Move matured delayed items and expired in-flight deliveries into
    /// the ready queue.
    fn promote(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].not_before <= now {
                let item = self.delayed.swap_remove(i);
                self.ready.push_back(item);
            } else {
                i += 1;
            }
        }

        let expired: Vec<AckToken> = self
            .in_flight
            .iter()
            .filter(|(_, item)| item.deadline <= now)
            .map(|(token, _)| *token)
            .collect();
        for token in expired {
            if let Some(item) = self.in_flight.remove(&token) {
                tracing::warn!(
                    job_id = %item.descriptor.job_id,
                    delivery_count = item.delivery_count,
                    "Visibility timeout expired; redelivering",
                );
                self.ready.push_back(PendingItem {
                    descriptor: item.descriptor,
                    not_before: now,
                    delivery_count: item.delivery_count,
                });
            }
        }
    }

    /// Earliest instant at which new work can become visible, if any.
    fn next_wake(&self) -> Option<Instant> {
        let delayed = self.delayed.iter().map(|p| p.not_before).min();
        let in_flight = self.in_flight.values().map(|f| f.deadline).min();
        match (delayed, in_flight) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }
}

/// Process-local [`WorkQueue`] backed by a mutex-guarded state machine and
/// a [`Notify`] for consumer wakeups.
pub struct MemoryQueue {
    config: QueueConfig,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    /// Number of items currently visible or delayed. Test helper.
    pub async fn backlog(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.ready.len() + inner.delayed.len()
    }

    /// Number of in-flight (delivered, unacknowledged) items. Test helper.
    pub async fn in_flight(&self) -> usize {
        self.inner.lock().await.in_flight.len()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

#[async_trait::async_trait]
impl WorkQueue for MemoryQueue {
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.lock().await;
            inner.ready.push_back(PendingItem {
                descriptor,
                not_before: Instant::now(),
                delivery_count: 0,
            });
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self) -> Result<Delivery, QueueError> {
        loop {
            let wake;
            {
                let now = Instant::now();
                let mut inner = self.inner.lock().await;
                inner.promote(now);

                if let Some(item) = inner.ready.pop_front() {
                    let token = AckToken(inner.next_token);
                    inner.next_token += 1;
                    let delivery_count = item.delivery_count + 1;
                    inner.in_flight.insert(
                        token,
                        InFlightItem {
                            descriptor: item.descriptor.clone(),
                            deadline: now + self.config.visibility_timeout,
                            delivery_count,
                        },
                    );
                    // Keep other blocked consumers live when more work is
                    // visible: a single notify permit only wakes one.
                    if !inner.ready.is_empty() {
                        self.notify.notify_one();
                    }
                    return Ok(Delivery {
                        descriptor: item.descriptor,
                        token,
                        delivery_count,
                    });
                }

                wake = inner.next_wake();
            }

            match wake {
                Some(at) => {
                    tokio::select! {
                        _ = self.notify.notified() => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    async fn ack(&self, token: AckToken) -> Result<(), QueueError> {
        let removed = self.inner.lock().await.in_flight.remove(&token);
        match removed {
            Some(_) => Ok(()),
            None => Err(QueueError::UnknownToken),
        }
    }

    async fn nack(&self, token: AckToken) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.lock().await;
            let item = inner
                .in_flight
                .remove(&token)
                .ok_or(QueueError::UnknownToken)?;
            inner.delayed.push(PendingItem {
                descriptor: item.descriptor,
                not_before: Instant::now() + self.config.redeliver_delay,
                delivery_count: item.delivery_count,
            });
        }
        // Wake a sleeper so it recomputes its wake deadline.
        self.notify.notify_one();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
