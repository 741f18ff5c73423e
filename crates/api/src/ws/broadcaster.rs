//! Event-to-connection fan-out.
//!
//! [`EventBroadcaster`] subscribes to the dispatch event bus and, for each
//! event, asks the registry which connections match the event's target, then
//! emits the wire event to each. Delivery is fire-and-forget: a closed or
//! slow consumer never blocks or fails the broadcast to others.

use std::sync::Arc;

use chrono::Utc;
use dispatch_db::models::task::Task;
use dispatch_events::{BroadcastTarget, DispatchEvent};
use tokio::sync::broadcast;

use crate::ws::protocol::{ServerEvent, TaskEventPayload};
use crate::ws::registry::ConnectionRegistry;

/// Routes dispatch events to matching live connections.
pub struct EventBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl EventBroadcaster {
    /// Create a broadcaster over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Run the fan-out loop.
    ///
    /// Subscribes to the event bus via `receiver` and processes each event.
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](dispatch_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<DispatchEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.fan_out(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event broadcaster lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, broadcaster shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event to every matching connection.
    async fn fan_out(&self, event: &DispatchEvent) {
        let Some(wire_event) = to_server_event(event) else {
            tracing::warn!(event_type = %event.event_type, "Unroutable event type");
            return;
        };

        let targets = self.registry.resolve_targets(&event.target).await;
        if targets.is_empty() {
            return;
        }

        let message = wire_event.to_message();
        let mut delivered = 0usize;
        for (_, sender) in &targets {
            // Closed channels are skipped; the owning receive loop cleans
            // the connection up on its next iteration.
            if sender.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }
        tracing::debug!(
            event_type = %event.event_type,
            matched = targets.len(),
            delivered,
            "Broadcast delivered"
        );
    }
}

/// Map a bus event onto its wire representation.
fn to_server_event(event: &DispatchEvent) -> Option<ServerEvent> {
    if let Some(payload) = task_payload(event) {
        return ServerEvent::task_event(&event.event_type, payload);
    }
    match event.event_type.as_str() {
        "notification.system" => Some(ServerEvent::SystemNotification {
            message: event.payload["message"].as_str().unwrap_or("").to_string(),
            payload: event.payload.clone(),
            timestamp: event.timestamp,
        }),
        "notification.personal" => Some(ServerEvent::PersonalNotification {
            message: event.payload["message"].as_str().unwrap_or("").to_string(),
            payload: event.payload.clone(),
            timestamp: event.timestamp,
        }),
        _ => None,
    }
}

/// Extract the typed task payload from a `task.*` event, if it is one.
fn task_payload(event: &DispatchEvent) -> Option<TaskEventPayload> {
    if !event.event_type.starts_with("task.") {
        return None;
    }
    serde_json::from_value(event.payload.clone()).ok()
}

// ---------------------------------------------------------------------------
// Event constructors used by the HTTP handlers
// ---------------------------------------------------------------------------

/// Build a `task.*` event for the given task, targeted per `target`.
pub fn task_event(event_type: &str, task: &Task, target: BroadcastTarget) -> DispatchEvent {
    let payload = TaskEventPayload {
        task_id: task.id,
        order_id: task.order_id,
        task_type: task.task_type.clone(),
        status: task.status.clone(),
        lat: task.lat,
        lng: task.lng,
        timestamp: Utc::now(),
    };
    DispatchEvent::new(event_type)
        .with_task(task.id)
        .with_payload(serde_json::to_value(payload).unwrap_or_default())
        .with_target(target)
}

/// Build a `notification.system` event carrying `message` plus any extra
/// payload fields. Global by default; callers narrow it with the
/// [`DispatchEvent`] target builders. Announcements belong to the back-office
/// collaborator; this exists for that boundary and for tests.
pub fn system_notification(message: &str, extra: serde_json::Value) -> DispatchEvent {
    let mut payload = match extra {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    payload.insert("message".into(), message.into());
    DispatchEvent::new("notification.system").with_payload(serde_json::Value::Object(payload))
}

/// The watcher-facing target for a task: connections covering its location
/// or subscribed to any of its required skills.
pub fn task_watchers(task: &Task) -> BroadcastTarget {
    BroadcastTarget {
        contractor_id: None,
        location: Some(task.location()),
        skills: if task.required_skills.is_empty() {
            None
        } else {
            Some(task.required_skills.clone())
        },
        exclude_contractor: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dispatch_core::types::Timestamp;

    fn sample_task() -> Task {
        let now: Timestamp = Utc::now();
        Task {
            id: 7,
            order_id: 3,
            task_type: "delivery".into(),
            status: "assigned".into(),
            lat: 29.42,
            lng: -98.49,
            required_skills: vec!["delivery".into()],
            assigned_to: Some(5),
            assigned_contractors: vec![5],
            payment_amount_cents: None,
            completion_notes: None,
            completion_photos: vec![],
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn task_events_round_trip_into_wire_events() {
        let event = task_event("task.claimed", &sample_task(), task_watchers(&sample_task()));
        assert_eq!(event.task_id, Some(7));

        let wire = to_server_event(&event).expect("task.claimed maps onto the wire");
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["event"], "task:claimed");
        assert_eq!(json["data"]["task_id"], 7);
        assert_eq!(json["data"]["status"], "assigned");
    }

    #[test]
    fn watcher_target_carries_location_and_skills() {
        let target = task_watchers(&sample_task());
        assert!(target.location.is_some());
        assert_eq!(target.skills.as_deref(), Some(&["delivery".to_string()][..]));
        assert!(!target.is_global());
    }

    #[test]
    fn system_notifications_round_trip_into_wire_events() {
        let event = system_notification(
            "Scheduled maintenance at 02:00 UTC",
            serde_json::json!({ "severity": "info" }),
        );
        assert!(event.target.is_global());

        let wire = to_server_event(&event).expect("notification.system maps onto the wire");
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["event"], "notification:system");
        assert_eq!(json["data"]["message"], "Scheduled maintenance at 02:00 UTC");
        assert_eq!(json["data"]["payload"]["severity"], "info");
    }

    #[test]
    fn unknown_event_types_are_unroutable() {
        let event = DispatchEvent::new("order.created");
        assert!(to_server_event(&event).is_none());
    }
}
