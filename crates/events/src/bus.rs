//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`DispatchEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` across the application. The bus
//! itself knows nothing about connections; targeting is described by the
//! event's [`BroadcastTarget`] and resolved by the connection registry at
//! fan-out time.

use chrono::{DateTime, Utc};
use dispatch_core::geo::GeoPoint;
use dispatch_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BroadcastTarget
// ---------------------------------------------------------------------------

/// Who should receive an event.
///
/// A connection matches when ANY of the set criteria hold: it belongs to
/// `contractor_id`, its declared radius contains `location`, or its
/// contractor has one of `skills`. Connections of `exclude_contractor` are
/// always removed from the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BroadcastTarget {
    /// Deliver to this specific contractor's connections.
    pub contractor_id: Option<DbId>,

    /// Deliver to connections whose declared circle contains this point.
    pub location: Option<GeoPoint>,

    /// Deliver to connections subscribed to any of these skills.
    pub skills: Option<Vec<String>>,

    /// Never deliver to this contractor (typically the actor).
    pub exclude_contractor: Option<DbId>,
}

impl BroadcastTarget {
    /// Target every authenticated connection (the `global` room).
    pub fn everyone() -> Self {
        Self::default()
    }

    /// Whether no positive criterion is set, i.e. this is a global broadcast.
    pub fn is_global(&self) -> bool {
        self.contractor_id.is_none() && self.location.is_none() && self.skills.is_none()
    }
}

// ---------------------------------------------------------------------------
// DispatchEvent
// ---------------------------------------------------------------------------

/// A domain event to be fanned out over the real-time transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    /// Dot-separated event name, e.g. `"task.claimed"`.
    pub event_type: String,

    /// The task this event concerns, when there is one.
    pub task_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// Targeting criteria resolved by the connection registry.
    pub target: BroadcastTarget,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DispatchEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            task_id: None,
            payload: serde_json::Value::Object(Default::default()),
            target: BroadcastTarget::everyone(),
            timestamp: Utc::now(),
        }
    }

    /// Attach the task this event concerns.
    pub fn with_task(mut self, task_id: DbId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set the targeting criteria.
    pub fn with_target(mut self, target: BroadcastTarget) -> Self {
        self.target = target;
        self
    }

    /// Target a single contractor.
    pub fn to_contractor(mut self, contractor_id: DbId) -> Self {
        self.target.contractor_id = Some(contractor_id);
        self
    }

    /// Exclude a contractor (typically the actor) from delivery.
    pub fn excluding(mut self, contractor_id: DbId) -> Self {
        self.target.exclude_contractor = Some(contractor_id);
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
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`DispatchEvent`].
pub struct EventBus {
    sender: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// delivery is fire-and-forget by design.
    pub fn publish(&self, event: DispatchEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
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
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = DispatchEvent::new("task.claimed")
            .with_task(42)
            .with_payload(serde_json::json!({"status": "assigned"}))
            .excluding(7);

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "task.claimed");
        assert_eq!(received.task_id, Some(42));
        assert_eq!(received.payload["status"], "assigned");
        assert_eq!(received.target.exclude_contractor, Some(7));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DispatchEvent::new("task.new"));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, "task.new");
        assert_eq!(e2.event_type, "task.new");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(DispatchEvent::new("orphan.event"));
    }

    #[test]
    fn bare_event_targets_everyone() {
        let event = DispatchEvent::new("notification.system");
        assert!(event.target.is_global());
        assert!(event.task_id.is_none());
        assert!(event.payload.is_object());
    }

    #[test]
    fn targeted_event_is_not_global() {
        let event = DispatchEvent::new("task.assigned").to_contractor(5);
        assert!(!event.target.is_global());
    }
}
