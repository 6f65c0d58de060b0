//! Per-client fixed-length request windows.
//!
//! A window opens on the first request from a client and admits up to
//! `capacity` requests until `window` has elapsed; the next request after
//! that opens a fresh window. Counts may reset mid-burst at a boundary.
//!
//! State lives in process memory only. Several instances behind a load
//! balancer each enforce their own limit.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default number of requests admitted per window.
pub const DEFAULT_CAPACITY: u32 = 5;

/// Result of asking the limiter for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { count: u32 },
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    started: Instant,
}

/// Sliding-window request gate keyed by client identity.
///
/// The increment-and-compare for one key happens under that key's entry
/// lock, so concurrent runs for the same client are serialized while other
/// clients proceed on other shards.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateWindow>,
    window: Duration,
    capacity: u32,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_CAPACITY)
    }
}

impl RateLimiter {
    pub fn new(window: Duration, capacity: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            capacity,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Record a request from `client_key` at `now` and decide whether it may proceed.
    pub fn admit(&self, client_key: &str, now: Instant) -> Admission {
        let mut entry = self
            .windows
            .entry(client_key.to_string())
            .or_insert(RateWindow {
                count: 0,
                started: now,
            });
        let state = entry.value_mut();

        if state.count == 0 || now.saturating_duration_since(state.started) > self.window {
            state.count = 1;
            state.started = now;
        } else {
            state.count = state.count.saturating_add(1);
        }

        if state.count <= self.capacity {
            debug!(client_key, count = state.count, "Request admitted");
            Admission::Allowed { count: state.count }
        } else {
            let elapsed = now.saturating_duration_since(state.started);
            let retry_after = self.window.saturating_sub(elapsed);
            warn!(
                client_key,
                count = state.count,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit triggered"
            );
            Admission::Denied { retry_after }
        }
    }

    /// Drop windows that have fully expired. Returns how many were removed.
    pub fn prune(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, state| now.saturating_duration_since(state.started) <= self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_sixth_request_in_window_is_denied() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for i in 1..=5 {
            let now = start + Duration::from_secs(i);
            assert_eq!(limiter.admit("10.0.0.1", now), Admission::Allowed { count: i as u32 });
        }

        let denied = limiter.admit("10.0.0.1", start + Duration::from_secs(10));
        assert_eq!(
            denied,
            Admission::Denied {
                retry_after: Duration::from_secs(51)
            }
        );
    }

    #[test]
    fn test_window_elapses_and_resets_count() {
        let limiter = RateLimiter::default();
        let start = Instant::now();

        for _ in 0..6 {
            limiter.admit("client", start);
        }
        assert!(!limiter.admit("client", start + Duration::from_secs(60)).is_allowed());

        let after = start + Duration::from_secs(61);
        assert_eq!(limiter.admit("client", after), Admission::Allowed { count: 1 });
        assert_eq!(
            limiter.admit("client", after + Duration::from_secs(1)),
            Admission::Allowed { count: 2 }
        );
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();

        assert!(limiter.admit("a", now).is_allowed());
        assert!(!limiter.admit("a", now).is_allowed());
        assert!(limiter.admit("b", now).is_allowed());
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_prune_removes_only_expired_windows() {
        let limiter = RateLimiter::new(Duration::from_secs(10), 5);
        let start = Instant::now();

        limiter.admit("old", start);
        limiter.admit("fresh", start + Duration::from_secs(8));

        let removed = limiter.prune(start + Duration::from_secs(15));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_admits_never_exceed_capacity() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), 5));
        let now = Instant::now();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || limiter.admit("shared", now).is_allowed())
            })
            .collect();

        let allowed = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|allowed| *allowed)
            .count();
        assert_eq!(allowed, 5);
    }
}
