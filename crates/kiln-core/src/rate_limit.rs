//! Fixed-window rate limiter keyed by client identity.
//!
//! Shaped after the `Instant`-based TTL cache the secrets manager uses to
//! expire cached values: a counter keyed in a map, carrying the instant it
//! was first set so staleness can be judged without a background sweeper.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Window {
    count: u32,
    started_at: Instant,
}

/// Allows up to `limit` requests per client within `window`. The window is
/// fixed, not sliding: it starts on the first request and does not refresh
/// on subsequent ones within the same window, even if doing so would let a
/// sustained caller exceed the rate across window boundaries. That is the
/// specified behavior, not an oversight.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// The default policy: 3 requests per 10-second window.
    pub fn default_policy() -> Self {
        Self::new(3, Duration::from_secs(10))
    }

    /// Returns `true` if the request is allowed, `false` if the client has
    /// exceeded its window.
    pub async fn allow(&self, client: &str) -> bool {
        let mut windows = self.windows.lock().await;
        match windows.get_mut(client) {
            Some(w) if w.started_at.elapsed() < self.window => {
                if w.count >= self.limit {
                    false
                } else {
                    w.count += 1;
                    true
                }
            }
            _ => {
                windows.insert(
                    client.to_string(),
                    Window {
                        count: 1,
                        started_at: Instant::now(),
                    },
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_limit_then_refuses() {
        let limiter = RateLimiter::default_policy();
        for _ in 0..3 {
            assert!(limiter.allow("client-a").await);
        }
        assert!(!limiter.allow("client-a").await);
    }

    #[tokio::test]
    async fn tracks_clients_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        assert!(limiter.allow("a").await);
        assert!(limiter.allow("b").await);
        assert!(!limiter.allow("a").await);
    }

    #[tokio::test]
    async fn resets_after_window_elapses() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.allow("a").await);
        assert!(!limiter.allow("a").await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.allow("a").await);
    }
}
