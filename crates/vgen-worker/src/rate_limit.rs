//! Shared job start limiter.
//!
//! Caps how many jobs the pool starts per window, across all slots. The
//! quota refills one job every `window / max`, with a burst of `max`.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tracing::debug;

pub struct JobRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    max: u32,
    window: Duration,
}

impl JobRateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max).unwrap_or(NonZeroU32::MIN);
        let period = (window / burst.get()).max(Duration::from_millis(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::direct(quota),
            max: burst.get(),
            window,
        }
    }

    /// Wait until another job may start.
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!(max = self.max, window_secs = self.window.as_secs(), "Rate limit reached, waiting");
            self.limiter.until_ready().await;
        }
    }

    /// Take a slot without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}
