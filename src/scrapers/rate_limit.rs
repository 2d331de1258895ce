use governor::{Quota, RateLimiter as Governor};
use std::time::Duration;
use tracing::debug;

type DirectLimiter = Governor<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Minimum-interval gate between network calls.
///
/// A GCRA limiter with a burst of one, so no call starts sooner than
/// `min_interval` after the previous one. Owned by the orchestrator and lent
/// to each fetch.
pub struct RateLimiter {
    min_interval: Duration,
    limiter: Option<DirectLimiter>,
}

impl RateLimiter {
    /// A zero interval disables the gate
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            limiter: Quota::with_period(min_interval).map(DirectLimiter::direct),
        }
    }

    /// Zero disables the gate
    pub fn per_minute(calls_per_minute: u32) -> Self {
        let min_interval = match calls_per_minute {
            0 => Duration::ZERO,
            n => Duration::from_secs(60) / n,
        };
        Self::new(min_interval)
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next call is allowed, then mark it as started
    pub async fn acquire(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        if limiter.check().is_err() {
            debug!("Rate limit: waiting up to {:?}", self.min_interval);
            limiter.until_ready().await;
        }
    }
}
