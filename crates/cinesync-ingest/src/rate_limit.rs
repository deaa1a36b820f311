//! Outbound request gate shared by every fetcher.
//!
//! A single token bucket (burst 1) built on `governor`. The limiter governs
//! throughput only: a wait that runs past `max_wait` is logged and counted and
//! the caller goes ahead anyway.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use tracing::warn;

use crate::error::{IngestError, Result};

type DirectLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

pub struct RateLimiter {
    limiter: DirectLimiter,
    max_wait: Duration,
    timeouts: AtomicUsize,
}

impl RateLimiter {
    /// Admit `requests_per_second` operations per second, one at a time.
    pub fn per_second(requests_per_second: u32, max_wait: Duration) -> Result<Self> {
        let rate = NonZeroU32::new(requests_per_second)
            .ok_or_else(|| IngestError::config("Requests per second must be greater than 0"))?;
        let period = Duration::from_secs(1) / rate.get();
        let quota = Quota::with_period(period)
            .ok_or_else(|| IngestError::config(format!("Rate {} per second is too high", rate)))?;

        Ok(Self {
            limiter: GovernorRateLimiter::direct(quota),
            max_wait,
            timeouts: AtomicUsize::new(0),
        })
    }

    /// Wait until the next request may go out.
    pub async fn acquire(&self) {
        if tokio::time::timeout(self.max_wait, self.limiter.until_ready())
            .await
            .is_err()
        {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
            warn!(
                max_wait_ms = self.max_wait.as_millis() as u64,
                "Rate limiter wait timed out, proceeding without a permit"
            );
        }
    }

    /// Waits that gave up on the limiter so far
    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::Relaxed)
    }
}
