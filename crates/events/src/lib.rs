//! Dispatch event bus.
//!
//! Task mutations and system notifications are published as
//! [`DispatchEvent`]s on an in-process [`EventBus`]; the real-time gateway
//! subscribes and fans each event out to the matching connections.

pub mod bus;

pub use bus::{BroadcastTarget, DispatchEvent, EventBus};
