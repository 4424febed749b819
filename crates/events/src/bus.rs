//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`LifecycleEvent`]s. It is
//! shared via `Arc<EventBus>` between the lifecycle services and the
//! background subscribers.

use chrono::Utc;
use cultura_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// A state change that has been durably committed.
///
/// Constructed via [`LifecycleEvent::new`] and enriched with the builder
/// methods [`with_subject`](LifecycleEvent::with_subject),
/// [`with_actor`](LifecycleEvent::with_actor),
/// [`with_payload`](LifecycleEvent::with_payload) and
/// [`at`](LifecycleEvent::at).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Dot-separated event name, e.g. `"contract.signed"`.
    pub event_type: String,

    /// Subject entity kind (`"call"`, `"project"`, ...).
    pub subject_kind: Option<String>,

    pub subject_id: Option<DbId>,

    /// The user that triggered the event. `None` for system sweeps and
    /// external signers.
    pub actor_id: Option<DbId>,

    /// Event-specific data for notification content.
    pub payload: serde_json::Value,

    pub occurred_at: Timestamp,
}

impl LifecycleEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            subject_kind: None,
            subject_id: None,
            actor_id: None,
            payload: serde_json::Value::Object(Default::default()),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_subject(mut self, kind: impl Into<String>, id: DbId) -> Self {
        self.subject_kind = Some(kind.into());
        self.subject_id = Some(id);
        self
    }

    pub fn with_actor(mut self, actor_id: impl Into<Option<DbId>>) -> Self {
        self.actor_id = actor_id.into();
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Override the occurrence time (services pass their clock's reading).
    pub fn at(mut self, occurred_at: Timestamp) -> Self {
        self.occurred_at = occurred_at;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use cultura_events::bus::{EventBus, LifecycleEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(LifecycleEvent::new("project.submitted"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no active subscribers the event is dropped.
    pub fn publish(&self, event: LifecycleEvent) {
        tracing::debug!(
            event_type = %event.event_type,
            subject_kind = ?event.subject_kind,
            subject_id = ?event.subject_id,
            "Publishing lifecycle event"
        );
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
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
    use chrono::TimeZone;

    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        bus.publish(
            LifecycleEvent::new("contract.signed")
                .with_subject("contract", 42)
                .with_actor(7)
                .with_payload(serde_json::json!({"contract_number": "CONT-2024-0001"}))
                .at(at),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "contract.signed");
        assert_eq!(received.subject_kind.as_deref(), Some("contract"));
        assert_eq!(received.subject_id, Some(42));
        assert_eq!(received.actor_id, Some(7));
        assert_eq!(received.payload["contract_number"], "CONT-2024-0001");
        assert_eq!(received.occurred_at, at);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(LifecycleEvent::new("call.finished"));

        assert_eq!(rx1.recv().await.unwrap().event_type, "call.finished");
        assert_eq!(rx2.recv().await.unwrap().event_type, "call.finished");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(LifecycleEvent::new("orphan.event"));
    }

    #[test]
    fn system_events_have_no_actor() {
        let event = LifecycleEvent::new("call.finished").with_actor(None);
        assert!(event.actor_id.is_none());
        assert!(event.payload.is_object());
    }
}
