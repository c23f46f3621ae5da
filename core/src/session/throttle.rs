//! Run-wide cap on transport actions per second

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket shared by every session of a run
///
/// Sessions wait on it after their inter-action delay. Without a limit it
/// never waits.
#[derive(Default)]
pub struct ActionThrottle {
    bucket: Option<(NonZeroU32, DirectLimiter)>,
}

impl ActionThrottle {
    /// Throttle to `max_per_second` actions
    ///
    /// `None` or an unusable rate leaves actions unthrottled. Fractional
    /// rates round up to whole actions per second, which is also the burst.
    pub fn new(max_per_second: Option<f64>) -> Self {
        let bucket = max_per_second
            .filter(|rps| rps.is_finite() && *rps > 0.0)
            .and_then(|rps| NonZeroU32::new(rps.ceil().min(f64::from(u32::MAX)) as u32))
            .map(|limit| (limit, RateLimiter::direct(Quota::per_second(limit))));
        Self { bucket }
    }

    /// Actions per second this throttle admits, if limited
    pub fn limit(&self) -> Option<u32> {
        self.bucket.as_ref().map(|(limit, _)| limit.get())
    }

    /// Wait for the next action slot
    pub async fn wait(&self) {
        if let Some((_, limiter)) = &self.bucket {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for ActionThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionThrottle")
            .field("limit", &self.limit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_unusable_rates_disable_throttle() {
        assert_eq!(ActionThrottle::default().limit(), None);
        assert_eq!(ActionThrottle::new(None).limit(), None);
        assert_eq!(ActionThrottle::new(Some(0.0)).limit(), None);
        assert_eq!(ActionThrottle::new(Some(-3.0)).limit(), None);
        assert_eq!(ActionThrottle::new(Some(f64::NAN)).limit(), None);
    }

    #[test]
    fn test_fractional_rate_rounds_up() {
        assert_eq!(ActionThrottle::new(Some(0.2)).limit(), Some(1));
        assert_eq!(ActionThrottle::new(Some(7.5)).limit(), Some(8));
    }

    // governor runs on the real clock
    #[tokio::test]
    async fn test_wait_blocks_past_burst() {
        let throttle = ActionThrottle::new(Some(10.0));
        let start = Instant::now();
        for _ in 0..10 {
            throttle.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(80));

        throttle.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let throttle = ActionThrottle::default();
        let start = Instant::now();
        for _ in 0..1000 {
            throttle.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        assert_eq!(format!("{:?}", throttle), "ActionThrottle { limit: None }");
    }
}
