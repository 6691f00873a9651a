use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::RateLimitConfig;

/// Client-side request throttle shared by every worker of a client.
///
/// Cloning shares the same bucket.
#[derive(Clone)]
pub struct RequestLimiter {
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl RequestLimiter {
    /// `requests_per_second` sustained, with up to `burst_size` at once.
    ///
    /// Non-positive rates fall back to one request per second; config
    /// validation rejects them before they get here.
    pub fn new(requests_per_second: f64, burst_size: u32) -> Self {
        let burst = NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN);
        let period = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::from_secs(1)
        };
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RequestLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestLimiter").finish_non_exhaustive()
    }
}
