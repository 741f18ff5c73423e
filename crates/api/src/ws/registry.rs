//! In-memory connection/room registry.
//!
//! Every live connection carries a small snapshot (contractor id, skills,
//! declared location) and rooms are a derived index recomputed from that
//! snapshot, so membership can never drift from the facts that produced it.
//! The registry is per-process: a connection registered here is invisible to
//! other processes (cross-process fan-out is an explicit extension point,
//! not something this type pretends to solve).
//!
//! Room names: `contractor:<id>`, `skill:<skill>`, `location:<x>:<y>`
//! (grid cells, see `dispatch_core::geo`), and `global`.

use std::collections::{HashMap, HashSet};

use axum::body::Bytes;
use axum::extract::ws::Message;
use chrono::Utc;
use dispatch_core::contractor::normalize_skills;
use dispatch_core::error::CoreError;
use dispatch_core::geo::{cells_covering, haversine_meters, validate_radius_miles, GeoCell,
    GeoPoint, miles_to_meters};
use dispatch_core::types::{DbId, Timestamp};
use dispatch_events::BroadcastTarget;
use tokio::sync::{mpsc, RwLock};

use crate::ws::protocol::RegistryStats;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Room every authenticated connection belongs to.
pub const GLOBAL_ROOM: &str = "global";

/// Coverage radius applied when a location update omits one, in miles.
pub const DEFAULT_RADIUS_MILES: f64 = 25.0;

/// A contractor's declared coverage area.
#[derive(Debug, Clone, Copy)]
pub struct DeclaredArea {
    pub point: GeoPoint,
    pub radius_m: f64,
}

/// Live state for a single WebSocket connection.
pub struct RegisteredConnection {
    /// Authenticated contractor this connection belongs to. A contractor may
    /// hold several concurrent connections (multiple devices).
    pub contractor_id: DbId,
    /// Skill subscription driving `skill:*` membership.
    pub skills: Vec<String>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
    /// Last inbound traffic (messages or pongs); drives stale purging.
    pub last_seen: Timestamp,
    /// Declared location, once the client has sent one.
    pub location: Option<DeclaredArea>,
    /// Rooms this connection currently belongs to (derived).
    rooms: HashSet<String>,
}

/// Internal state guarded by one lock so room membership and connection
/// snapshots always change together.
#[derive(Default)]
struct RegistryInner {
    connections: HashMap<String, RegisteredConnection>,
    rooms: HashMap<String, HashSet<String>>,
}

impl RegistryInner {
    fn join_room(&mut self, socket_id: &str, room: String) {
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(socket_id.to_string());
        if let Some(conn) = self.connections.get_mut(socket_id) {
            conn.rooms.insert(room);
        }
    }

    fn leave_room(&mut self, socket_id: &str, room: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(socket_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
        if let Some(conn) = self.connections.get_mut(socket_id) {
            conn.rooms.remove(room);
        }
    }

    /// Leave every room whose name matches `prefix`.
    fn leave_rooms_with_prefix(&mut self, socket_id: &str, prefix: &str) {
        let stale: Vec<String> = self
            .connections
            .get(socket_id)
            .map(|c| {
                c.rooms
                    .iter()
                    .filter(|r| r.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for room in stale {
            self.leave_room(socket_id, &room);
        }
    }

    fn room_members(&self, room: &str) -> impl Iterator<Item = &String> {
        self.rooms.get(room).into_iter().flatten()
    }
}

/// Manages all active WebSocket connections and their room memberships.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register a new connection for an authenticated contractor.
    ///
    /// Joins `global`, `contractor:<id>`, and `skill:<s>` for each of the
    /// contractor's skills. Returns the receiver half of the outbound
    /// message channel so the caller can forward messages to the socket sink.
    pub async fn register(
        &self,
        socket_id: String,
        contractor_id: DbId,
        skills: Vec<String>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let skills = normalize_skills(skills);
        let now = Utc::now();

        let mut inner = self.inner.write().await;
        inner.connections.insert(
            socket_id.clone(),
            RegisteredConnection {
                contractor_id,
                skills: skills.clone(),
                sender: tx,
                connected_at: now,
                last_seen: now,
                location: None,
                rooms: HashSet::new(),
            },
        );
        inner.join_room(&socket_id, GLOBAL_ROOM.to_string());
        inner.join_room(&socket_id, format!("contractor:{contractor_id}"));
        for skill in &skills {
            inner.join_room(&socket_id, format!("skill:{skill}"));
        }
        rx
    }

    /// Update a connection's declared location and coverage radius (miles).
    ///
    /// Validates coordinate bounds and the radius cap, then atomically
    /// replaces all `location:*` memberships with the cells covering the new
    /// circle; there is never a moment with stale dual membership.
    pub async fn update_location(
        &self,
        socket_id: &str,
        lat: f64,
        lng: f64,
        radius_miles: Option<f64>,
    ) -> Result<DeclaredArea, CoreError> {
        let point = GeoPoint::new(lat, lng);
        point.validate()?;
        let radius_miles = radius_miles.unwrap_or(DEFAULT_RADIUS_MILES);
        validate_radius_miles(radius_miles)?;
        let area = DeclaredArea {
            point,
            radius_m: miles_to_meters(radius_miles),
        };

        let mut inner = self.inner.write().await;
        if !inner.connections.contains_key(socket_id) {
            return Err(CoreError::Validation(format!(
                "Unknown connection: {socket_id}"
            )));
        }

        inner.leave_rooms_with_prefix(socket_id, "location:");
        for cell in cells_covering(&area.point, area.radius_m) {
            inner.join_room(socket_id, cell.room_name());
        }
        if let Some(conn) = inner.connections.get_mut(socket_id) {
            conn.location = Some(area);
        }
        Ok(area)
    }

    /// Replace a connection's skill subscription. Passing `None` leaves the
    /// current subscription untouched. Returns the normalized skill list now
    /// in effect.
    pub async fn update_subscription(
        &self,
        socket_id: &str,
        skills: Option<Vec<String>>,
    ) -> Result<Vec<String>, CoreError> {
        let mut inner = self.inner.write().await;
        if !inner.connections.contains_key(socket_id) {
            return Err(CoreError::Validation(format!(
                "Unknown connection: {socket_id}"
            )));
        }

        if let Some(skills) = skills {
            let skills = normalize_skills(skills);
            inner.leave_rooms_with_prefix(socket_id, "skill:");
            for skill in &skills {
                inner.join_room(socket_id, format!("skill:{skill}"));
            }
            if let Some(conn) = inner.connections.get_mut(socket_id) {
                conn.skills = skills.clone();
            }
            Ok(skills)
        } else {
            Ok(inner
                .connections
                .get(socket_id)
                .map(|c| c.skills.clone())
                .unwrap_or_default())
        }
    }

    /// Remove a connection from every room it was in. Idempotent.
    pub async fn unregister(&self, socket_id: &str) {
        let mut inner = self.inner.write().await;
        let rooms: Vec<String> = inner
            .connections
            .get(socket_id)
            .map(|c| c.rooms.iter().cloned().collect())
            .unwrap_or_default();
        for room in rooms {
            inner.leave_room(socket_id, &room);
        }
        inner.connections.remove(socket_id);
    }

    /// Refresh a connection's liveness timestamp.
    pub async fn touch(&self, socket_id: &str) {
        if let Some(conn) = self.inner.write().await.connections.get_mut(socket_id) {
            conn.last_seen = Utc::now();
        }
    }

    /// Resolve the deduplicated set of connections matching a broadcast
    /// target. A connection matches when ANY criterion holds; the excluded
    /// contractor's connections are always removed. With no criteria set,
    /// this is the `global` room.
    pub async fn resolve_targets(&self, target: &BroadcastTarget) -> Vec<(String, WsSender)> {
        let inner = self.inner.read().await;
        let mut matched: HashSet<&String> = HashSet::new();

        if target.is_global() {
            matched.extend(inner.room_members(GLOBAL_ROOM));
        } else {
            if let Some(contractor_id) = target.contractor_id {
                matched.extend(inner.room_members(&format!("contractor:{contractor_id}")));
            }
            if let Some(skills) = &target.skills {
                for skill in normalize_skills(skills) {
                    matched.extend(inner.room_members(&format!("skill:{skill}")));
                }
            }
            if let Some(point) = &target.location {
                // Candidates come from the point's cell room; the exact
                // haversine check removes grid over-approximation.
                let room = GeoCell::containing(point).room_name();
                for socket_id in inner.room_members(&room) {
                    let Some(conn) = inner.connections.get(socket_id) else {
                        continue;
                    };
                    let Some(area) = conn.location else { continue };
                    if haversine_meters(&area.point, point) <= area.radius_m {
                        matched.insert(socket_id);
                    }
                }
            }
        }

        matched
            .into_iter()
            .filter_map(|socket_id| {
                let conn = inner.connections.get(socket_id)?;
                if target.exclude_contractor == Some(conn.contractor_id) {
                    return None;
                }
                Some((socket_id.clone(), conn.sender.clone()))
            })
            .collect()
    }

    /// Send a message to one connection. Returns whether the connection was
    /// known and its channel open.
    pub async fn send_to(&self, socket_id: &str, message: Message) -> bool {
        let inner = self.inner.read().await;
        match inner.connections.get(socket_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// The rooms a connection currently belongs to, sorted.
    pub async fn rooms_of(&self, socket_id: &str) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut rooms: Vec<String> = inner
            .connections
            .get(socket_id)
            .map(|c| c.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Aggregate statistics: per-room membership counts, total connections,
    /// distinct contractors. Operational visibility only, never targeting.
    pub async fn stats(&self) -> RegistryStats {
        let inner = self.inner.read().await;
        let distinct: HashSet<DbId> = inner
            .connections
            .values()
            .map(|c| c.contractor_id)
            .collect();
        RegistryStats {
            total_connections: inner.connections.len(),
            distinct_contractors: distinct.len(),
            rooms: inner
                .rooms
                .iter()
                .map(|(name, members)| (name.clone(), members.len()))
                .collect(),
        }
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let inner = self.inner.read().await;
        for conn in inner.connections.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }

    /// Purge connections silent for longer than `max_idle`. Each purged
    /// connection gets a Close frame and leaves every room immediately.
    /// Returns the purged socket ids.
    pub async fn purge_stale(&self, max_idle: chrono::Duration) -> Vec<String> {
        let cutoff = Utc::now() - max_idle;
        let mut inner = self.inner.write().await;

        let stale: Vec<String> = inner
            .connections
            .iter()
            .filter(|(_, conn)| conn.last_seen < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for socket_id in &stale {
            if let Some(conn) = inner.connections.get(socket_id) {
                let _ = conn.sender.send(Message::Close(None));
            }
            let rooms: Vec<String> = inner
                .connections
                .get(socket_id)
                .map(|c| c.rooms.iter().cloned().collect())
                .unwrap_or_default();
            for room in rooms {
                inner.leave_room(socket_id, &room);
            }
            inner.connections.remove(socket_id);
        }
        stale
    }

    /// Send a Close frame to every connection, then clear the registry.
    ///
    /// Used during graceful shutdown to notify all clients before the server
    /// stops accepting new connections.
    pub async fn shutdown_all(&self) {
        let mut inner = self.inner.write().await;
        let count = inner.connections.len();
        for conn in inner.connections.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        inner.connections.clear();
        inner.rooms.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
