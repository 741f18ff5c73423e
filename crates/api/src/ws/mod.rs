//! Real-time transport: handshake, protocol, rooms, rate limiting, fan-out.

pub mod broadcaster;
pub mod handler;
pub mod protocol;
pub mod rate_limit;
pub mod registry;

pub use broadcaster::EventBroadcaster;
pub use handler::{start_heartbeat, ws_handler};
pub use rate_limit::RateLimiter;
pub use registry::ConnectionRegistry;
