//! Tunables for the adaptive rate limiter's three-state policy.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Fixed spacing between queued requests while in `rate_limited` mode.
    pub request_interval: Duration,
    /// Base of the exponential backoff applied to repeated 429s within `rate_limited` mode.
    pub backoff_base: Duration,
    /// Ceiling on the exponential backoff.
    pub backoff_cap: Duration,
    /// Consecutive successes in `rate_limited` mode required to enter `recovering`.
    pub successes_to_recover: u32,
    /// Time in `rate_limited` mode after which recovery starts regardless of success count.
    pub recovery_timeout: Duration,
    /// Inter-request spacing for each step of `recovering`, in order; `[]` behaves like `[0]`.
    pub recovery_steps: Vec<Duration>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            request_interval: Duration::from_secs(10),
            backoff_base: Duration::from_secs(10),
            backoff_cap: Duration::from_secs(120),
            successes_to_recover: 5,
            recovery_timeout: Duration::from_secs(10 * 60),
            recovery_steps: [5, 2, 1, 0].into_iter().map(Duration::from_secs).collect(),
        }
    }
}
