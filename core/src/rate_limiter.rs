//! Sliding-window admission control keyed by identifier
//!
//! Each identifier (normally a provider id) gets its own window of recent
//! admission timestamps. A request is admitted when fewer than the limit
//! fall inside the trailing window; admitted requests are recorded, denied
//! ones are not. Stale timestamps are evicted lazily on each check.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Per-identifier sliding-window rate limiter
///
/// Safe to share across tasks via `Arc`; the check-and-record step runs
/// under a single lock so concurrent callers never over-admit.
pub struct RateLimiter {
    default_limit: usize,
    window: Duration,
    overrides: Mutex<HashMap<String, usize>>,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_per_window` requests per `window`
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            default_limit: max_per_window,
            window,
            overrides: Mutex::new(HashMap::new()),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter with a 60 second window
    pub fn per_minute(max_per_minute: usize) -> Self {
        Self::new(max_per_minute, DEFAULT_WINDOW)
    }

    /// Override the limit for one identifier
    pub fn set_limit(&self, identifier: impl Into<String>, max_per_window: usize) {
        self.overrides.lock().insert(identifier.into(), max_per_window);
    }

    /// Limit in force for `identifier`
    pub fn limit_for(&self, identifier: &str) -> usize {
        self.overrides
            .lock()
            .get(identifier)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit one request for `identifier` if the window has room
    ///
    /// Unknown identifiers start with an empty window.
    pub fn admit(&self, identifier: &str) -> bool {
        let limit = self.limit_for(identifier);
        let now = Instant::now();

        let mut windows = self.windows.lock();
        let window = windows.entry(identifier.to_string()).or_default();
        evict(window, now, self.window);

        if window.len() < limit {
            window.push_back(now);
            true
        } else {
            tracing::trace!(identifier, limit, "Rate limit window full");
            false
        }
    }

    /// Admissions currently inside the window for `identifier`
    pub fn in_window(&self, identifier: &str) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock();
        match windows.get_mut(identifier) {
            Some(window) => {
                evict(window, now, self.window);
                window.len()
            }
            None => 0,
        }
    }

    /// Admissions left before `identifier` is denied
    pub fn remaining(&self, identifier: &str) -> usize {
        self.limit_for(identifier)
            .saturating_sub(self.in_window(identifier))
    }
}

fn evict(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(&oldest) = window.front() {
        if now.duration_since(oldest) >= length {
            window.pop_front();
        } else {
            break;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("default_limit", &self.default_limit)
            .field("window", &self.window)
            .field("tracked", &self.windows.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.admit("a"));
        }
        assert!(!limiter.admit("a"));
        assert_eq!(limiter.in_window("a"), 5);
        assert_eq!(limiter.remaining("a"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        for _ in 0..5 {
            assert!(limiter.admit("a"));
        }
        assert!(!limiter.admit("a"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(limiter.admit("a"));
        assert_eq!(limiter.in_window("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_slide_frees_oldest_only() {
        let limiter = RateLimiter::new(2, Duration::from_secs(10));
        assert!(limiter.admit("a"));
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(limiter.admit("a"));
        assert!(!limiter.admit("a"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(limiter.admit("a"));
        assert!(!limiter.admit("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_requests_are_not_recorded() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        assert!(limiter.admit("a"));
        for _ in 0..10 {
            assert!(!limiter.admit("a"));
        }
        assert_eq!(limiter.in_window("a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.admit("a"));
        assert!(!limiter.admit("a"));
        assert!(limiter.admit("b"));
        assert_eq!(limiter.in_window("unknown"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_identifier_override() {
        let limiter = RateLimiter::per_minute(1);
        limiter.set_limit("fast", 3);
        assert_eq!(limiter.limit_for("fast"), 3);
        assert_eq!(limiter.limit_for("slow"), 1);
        assert!(limiter.admit("fast"));
        assert!(limiter.admit("fast"));
        assert!(limiter.admit("fast"));
        assert!(!limiter.admit("fast"));
    }

    #[tokio::test]
    async fn test_zero_limit_denies_everything() {
        let limiter = RateLimiter::per_minute(0);
        assert!(!limiter.admit("a"));
    }

    #[tokio::test]
    async fn test_concurrent_admits_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(50, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                (0..25).filter(|_| limiter.admit("shared")).count()
            }));
        }
        let mut admitted = 0;
        for handle in handles {
            admitted += handle.await.unwrap();
        }
        assert_eq!(admitted, 50);
    }
}
