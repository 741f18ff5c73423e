use std::sync::Arc;

use crate::config::ServerConfig;
use crate::ws::{ConnectionRegistry, RateLimiter};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: dispatch_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-memory connection/room registry (per-process by design).
    pub registry: Arc<ConnectionRegistry>,
    /// Per-contractor, per-event rate limiter for inbound socket events.
    pub rate_limiter: Arc<RateLimiter>,
    /// Centralized event bus for publishing dispatch events.
    pub event_bus: Arc<dispatch_events::EventBus>,
}
