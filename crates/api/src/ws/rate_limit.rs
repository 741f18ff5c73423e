//! Fixed-window rate limiting for inbound socket events.
//!
//! Counters are keyed on (contractor, event name) so one chatty event type
//! cannot starve the others, and one contractor cannot starve the rest.
//! Counters live in process memory, matching the registry's per-process
//! scope. Exceeding a limit yields a structured error with the remaining
//! window, never a silent drop.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use dispatch_core::types::DbId;
use tokio::time::Instant;

/// Default fixed window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Per-window limit for an event name.
///
/// Liveness traffic is cheap and frequent; mutation events are not.
fn limit_for(event_name: &str) -> u32 {
    match event_name {
        "ping" => 60,
        "notification:ack" => 60,
        "contractor:location-update" => 30,
        "task:subscribe" => 10,
        "contractor:join" => 5,
        "debug:room-info" => 10,
        _ => 10,
    }
}

/// Rejection info for a rate-limited event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Seconds until the current window resets.
    pub retry_after_secs: u64,
}

struct WindowCounter {
    window_start: Instant,
    count: u32,
}

/// Fixed-window counter store, one counter per (contractor, event name).
pub struct RateLimiter {
    window: Duration,
    counters: Mutex<HashMap<(DbId, &'static str), WindowCounter>>,
}

impl RateLimiter {
    /// Create a limiter with the given window length.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Record one event and check it against the per-event limit.
    ///
    /// Returns `Err` with the remaining window when the event would exceed
    /// the limit; the event counter is not advanced past the limit, so the
    /// first event of the next window always succeeds.
    pub fn check(
        &self,
        contractor_id: DbId,
        event_name: &'static str,
    ) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let limit = limit_for(event_name);

        let mut counters = self.counters.lock().expect("rate limiter lock poisoned");
        let counter = counters
            .entry((contractor_id, event_name))
            .or_insert(WindowCounter {
                window_start: now,
                count: 0,
            });

        // Window elapsed: start a fresh one.
        if now.duration_since(counter.window_start) >= self.window {
            counter.window_start = now;
            counter.count = 0;
        }

        if counter.count >= limit {
            let elapsed = now.duration_since(counter.window_start);
            let retry_after_secs = self.window.saturating_sub(elapsed).as_secs().max(1);
            return Err(RateLimitExceeded { retry_after_secs });
        }

        counter.count += 1;
        Ok(())
    }

    /// Drop counters whose window has long elapsed. Called opportunistically
    /// by the heartbeat task to bound memory.
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.counters
            .lock()
            .expect("rate limiter lock poisoned")
            .retain(|_, c| now.duration_since(c.window_start) < window * 2);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn limit_rejects_within_window_and_recovers_after() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let limit = limit_for("contractor:location-update");

        for _ in 0..limit {
            limiter
                .check(1, "contractor:location-update")
                .expect("within limit");
        }

        // One past the limit, same window: rejected with reset info.
        let rejected = limiter
            .check(1, "contractor:location-update")
            .expect_err("over limit");
        assert!(rejected.retry_after_secs > 0 && rejected.retry_after_secs <= 60);

        // After the window elapses, the same event succeeds again.
        tokio::time::advance(Duration::from_secs(61)).await;
        limiter
            .check(1, "contractor:location-update")
            .expect("window reset");
    }

    #[tokio::test(start_paused = true)]
    async fn counters_are_independent_per_contractor_and_event() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let limit = limit_for("task:subscribe");

        for _ in 0..limit {
            limiter.check(1, "task:subscribe").expect("within limit");
        }
        assert!(limiter.check(1, "task:subscribe").is_err());

        // A different contractor is unaffected.
        limiter.check(2, "task:subscribe").expect("other contractor");
        // A different event type from the same contractor is unaffected.
        limiter.check(1, "ping").expect("other event type");
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_expired_counters_only() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        limiter.check(1, "ping").unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check(2, "ping").unwrap();

        tokio::time::advance(Duration::from_secs(100)).await;
        limiter.prune();

        let counters = limiter.counters.lock().unwrap();
        assert!(!counters.contains_key(&(1, "ping")), "expired counter kept");
        assert!(counters.contains_key(&(2, "ping")), "live counter dropped");
    }
}
