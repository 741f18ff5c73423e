//! Wire protocol for the real-time transport.
//!
//! Every frame is a JSON text message shaped `{"event": <name>, "data": ...}`.
//! Inbound events are modeled as one typed enum so the supported set is
//! enumerable and each handler is unit-testable without a live socket.

use axum::extract::ws::Message;
use dispatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// Location payload for `contractor:location-update`. Radius is in miles and
/// optional; the server applies a default when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationUpdatePayload {
    pub lat: f64,
    pub lng: f64,
    pub radius: Option<f64>,
}

/// Filter payload for `task:subscribe`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSubscribePayload {
    pub skills: Option<Vec<String>>,
    pub location: Option<LocationUpdatePayload>,
}

/// Payload for `notification:ack`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationAckPayload {
    pub notification_id: String,
}

/// Every event a client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Re-confirm presence; membership is established at handshake.
    #[serde(rename = "contractor:join")]
    Join,

    /// Declare or move the contractor's location and coverage radius.
    #[serde(rename = "contractor:location-update")]
    LocationUpdate(LocationUpdatePayload),

    /// Update the skill/location subscription used for task fan-out.
    #[serde(rename = "task:subscribe")]
    TaskSubscribe(TaskSubscribePayload),

    /// Liveness probe; carries no business semantics.
    #[serde(rename = "ping")]
    Ping,

    /// Acknowledge a previously pushed notification (at-most-once delivery;
    /// the server never retries).
    #[serde(rename = "notification:ack")]
    NotificationAck(NotificationAckPayload),

    /// Operational diagnosis: the caller's rooms plus aggregate stats.
    #[serde(rename = "debug:room-info")]
    RoomInfo,
}

impl ClientEvent {
    /// Stable event name, used as the rate-limit key.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join => "contractor:join",
            ClientEvent::LocationUpdate(_) => "contractor:location-update",
            ClientEvent::TaskSubscribe(_) => "task:subscribe",
            ClientEvent::Ping => "ping",
            ClientEvent::NotificationAck(_) => "notification:ack",
            ClientEvent::RoomInfo => "debug:room-info",
        }
    }
}

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

/// Closed enumeration of real-time error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WsErrorCode {
    AuthenticationRequired,
    TokenExpired,
    TokenInvalid,
    ContractorNotFound,
    ContractorInactive,
    ContractorNotVerified,
    RateLimitExceeded,
    InvalidLocation,
    LocationUpdateFailed,
    SubscriptionFailed,
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Typed payload for `task:*` events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEventPayload {
    pub task_id: DbId,
    pub order_id: DbId,
    pub task_type: String,
    pub status: String,
    pub lat: f64,
    pub lng: f64,
    pub timestamp: Timestamp,
}

/// Aggregate registry statistics, for operational visibility only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_connections: usize,
    pub distinct_contractors: usize,
    pub rooms: std::collections::HashMap<String, usize>,
}

/// Every event the server may emit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "connection:established")]
    ConnectionEstablished {
        contractor_id: DbId,
        socket_id: String,
        timestamp: Timestamp,
    },

    #[serde(rename = "connection:error")]
    ConnectionError { message: String, error: String },

    #[serde(rename = "contractor:location-updated")]
    LocationUpdated {
        lat: f64,
        lng: f64,
        radius_miles: f64,
        timestamp: Timestamp,
    },

    #[serde(rename = "task:new")]
    TaskNew(TaskEventPayload),

    #[serde(rename = "task:assigned")]
    TaskAssigned(TaskEventPayload),

    #[serde(rename = "task:updated")]
    TaskUpdated(TaskEventPayload),

    #[serde(rename = "task:claimed")]
    TaskClaimed(TaskEventPayload),

    #[serde(rename = "task:cancelled")]
    TaskCancelled(TaskEventPayload),

    #[serde(rename = "task:completed")]
    TaskCompleted(TaskEventPayload),

    #[serde(rename = "task:subscription-confirmed")]
    SubscriptionConfirmed {
        skills: Vec<String>,
        timestamp: Timestamp,
    },

    #[serde(rename = "notification:system")]
    SystemNotification {
        message: String,
        payload: serde_json::Value,
        timestamp: Timestamp,
    },

    #[serde(rename = "notification:personal")]
    PersonalNotification {
        message: String,
        payload: serde_json::Value,
        timestamp: Timestamp,
    },

    #[serde(rename = "pong")]
    Pong { timestamp: Timestamp },

    #[serde(rename = "debug:room-info-response")]
    RoomInfoResponse {
        rooms: Vec<String>,
        stats: RegistryStats,
    },

    #[serde(rename = "error")]
    Error { message: String, code: WsErrorCode },
}

impl ServerEvent {
    /// Serialize into a WebSocket text frame.
    pub fn to_message(&self) -> Message {
        // ServerEvent has no map keys outside serde's control; serialization
        // cannot fail.
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        Message::Text(json.into())
    }

    /// Build a task event for the given dot-separated bus event type.
    ///
    /// Returns `None` for event types that do not map onto the transport.
    pub fn task_event(event_type: &str, payload: TaskEventPayload) -> Option<Self> {
        match event_type {
            "task.new" => Some(ServerEvent::TaskNew(payload)),
            "task.assigned" => Some(ServerEvent::TaskAssigned(payload)),
            "task.updated" => Some(ServerEvent::TaskUpdated(payload)),
            "task.claimed" => Some(ServerEvent::TaskClaimed(payload)),
            "task.cancelled" => Some(ServerEvent::TaskCancelled(payload)),
            "task.completed" => Some(ServerEvent::TaskCompleted(payload)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn inbound_events_parse_from_wire_shape() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"contractor:location-update","data":{"lat":29.42,"lng":-98.49,"radius":10}}"#,
        )
        .expect("parse should succeed");
        assert_matches!(event, ClientEvent::LocationUpdate(ref p) if p.radius == Some(10.0));
        assert_eq!(event.name(), "contractor:location-update");
    }

    #[test]
    fn payloadless_events_parse_without_data() {
        let ping: ClientEvent = serde_json::from_str(r#"{"event":"ping"}"#).unwrap();
        assert_matches!(ping, ClientEvent::Ping);

        let join: ClientEvent = serde_json::from_str(r#"{"event":"contractor:join"}"#).unwrap();
        assert_matches!(join, ClientEvent::Join);
    }

    #[test]
    fn unknown_event_is_a_parse_error() {
        let result = serde_json::from_str::<ClientEvent>(r#"{"event":"task:claim"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn notification_ack_uses_camel_case() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"notification:ack","data":{"notificationId":"n-1"}}"#,
        )
        .unwrap();
        assert_matches!(event, ClientEvent::NotificationAck(ref p) if p.notification_id == "n-1");
    }

    #[test]
    fn error_codes_serialize_screaming_snake() {
        let json = serde_json::to_string(&WsErrorCode::RateLimitExceeded).unwrap();
        assert_eq!(json, r#""RATE_LIMIT_EXCEEDED""#);
        let json = serde_json::to_string(&WsErrorCode::ContractorNotVerified).unwrap();
        assert_eq!(json, r#""CONTRACTOR_NOT_VERIFIED""#);
    }

    #[test]
    fn outbound_events_use_colon_names() {
        let event = ServerEvent::Pong {
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(event.to_message_json()).unwrap();
        assert_eq!(json["event"], "pong");
        assert!(json["data"]["timestamp"].is_string());
    }

    #[test]
    fn bus_event_types_map_to_task_events() {
        let payload = TaskEventPayload {
            task_id: 1,
            order_id: 2,
            task_type: "delivery".into(),
            status: "assigned".into(),
            lat: 29.42,
            lng: -98.49,
            timestamp: chrono::Utc::now(),
        };
        assert_matches!(
            ServerEvent::task_event("task.claimed", payload.clone()),
            Some(ServerEvent::TaskClaimed(_))
        );
        assert_matches!(
            ServerEvent::task_event("notification.system", payload),
            None
        );
    }

    impl ServerEvent {
        /// Test helper: the JSON value a client would receive.
        fn to_message_json(&self) -> serde_json::Value {
            serde_json::to_value(self).unwrap()
        }
    }
}
