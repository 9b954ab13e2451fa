//! Fixed-window per-client rate limiting for the REST surface. This is a
//! distinct concern from the Notification Dispatcher's dedup window —
//! here every request from a client counts against a budget, not just the
//! first of a kind.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct ClientState {
    count: u64,
    window_start: Instant,
}

pub struct RateLimiter {
    clients: Arc<DashMap<String, ClientState>>,
    max_requests: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window: Duration) -> Self {
        Self { clients: Arc::new(DashMap::new()), max_requests, window }
    }

    /// Returns `true` if the request from `client_key` is allowed under the
    /// current window.
    pub fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self
            .clients
            .entry(client_key.to_string())
            .or_insert_with(|| ClientState { count: 0, window_start: now });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            true
        } else {
            false
        }
    }

    /// Drops entries whose window has long since expired. Intended to be
    /// called periodically from a background task so the map doesn't grow
    /// without bound under churn from many distinct clients.
    pub fn gc(&self) {
        let now = Instant::now();
        self.clients.retain(|_, state| now.duration_since(state.window_start) < self.window * 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_requests() {
        let rl = RateLimiter::new(3, Duration::from_secs(60));
        assert!(rl.check("client1"));
        assert!(rl.check("client1"));
        assert!(rl.check("client1"));
        assert!(!rl.check("client1"));
    }

    #[test]
    fn different_clients_are_independent() {
        let rl = RateLimiter::new(1, Duration::from_secs(60));
        assert!(rl.check("a"));
        assert!(!rl.check("a"));
        assert!(rl.check("b"));
    }
}
