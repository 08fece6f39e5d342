//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` across the application; any
//! number of subscribers independently receive every published
//! [`JobEvent`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfscan_core::JobId;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A job lifecycle event.
///
/// `event_type` is one of the dot-separated names in
/// `shelfscan_core::job_events` (e.g. `"job.completed"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub event_type: String,

    /// The job this event is about.
    pub job_id: JobId,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Create a new event with an empty payload.
    pub fn new(event_type: impl Into<String>, job_id: JobId) -> Self {
        Self {
            event_type: event_type.into(),
            job_id,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use shelfscan_core::job_events::{EVENT_JOB_COMPLETED, EVENT_JOB_QUEUED};

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let job_id = JobId::new();
        let event = JobEvent::new(EVENT_JOB_COMPLETED, job_id)
            .with_payload(serde_json::json!({"attempt_count": 1}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, EVENT_JOB_COMPLETED);
        assert_eq!(received.job_id, job_id);
        assert_eq!(received.payload["attempt_count"], 1);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(JobEvent::new(EVENT_JOB_QUEUED, JobId::new()));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, EVENT_JOB_QUEUED);
        assert_eq!(e2.event_type, EVENT_JOB_QUEUED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers -- this must not panic.
        bus.publish(JobEvent::new(EVENT_JOB_QUEUED, JobId::new()));
    }

    #[test]
    fn new_event_has_an_empty_payload() {
        let event = JobEvent::new(EVENT_JOB_QUEUED, JobId::new());
        assert!(event.payload.is_object());
        assert_eq!(event.payload.as_object().unwrap().len(), 0);
    }
}
