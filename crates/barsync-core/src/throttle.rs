//! Quota enforcement for outbound source calls.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared gate that spaces outbound calls so no rolling quota window ever
/// holds more than its limit.
///
/// Calls are spaced evenly at `window / limit` rather than allowing a burst
/// of `limit`: a burst would satisfy the limiter's own bookkeeping but could
/// place more than `limit` calls inside an arbitrary rolling window.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DirectRateLimiter>,
}

impl RateGate {
    #[must_use]
    pub fn new(quota_window: Duration, quota_limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(
                quota_window,
                quota_limit,
            ))),
        }
    }

    /// Wait until the next call is within quota.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a slot only if one is available right now.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(NonZeroU32::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn first_slot_is_immediate_then_spaced() {
        let gate = RateGate::new(Duration::from_secs(60), 2);
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire(), "second slot must wait out the period");
    }

    #[tokio::test]
    async fn acquire_enforces_even_spacing() {
        let gate = RateGate::new(Duration::from_millis(100), 2);
        let start = Instant::now();
        for _ in 0..3 {
            gate.acquire().await;
        }
        // Three calls at 50ms spacing need at least ~100ms in total.
        assert!(
            start.elapsed() >= Duration::from_millis(80),
            "calls completed too quickly: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn zero_limit_is_clamped_to_one() {
        let gate = RateGate::new(Duration::from_millis(10), 0);
        gate.acquire().await;
    }
}
