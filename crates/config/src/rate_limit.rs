//! Tunables for the adaptive rate limiter (§4.G). Mirrors [`ratelimit::RateLimiterConfig`]'s
//! defaults so the TOML surface and the hardcoded fallbacks never drift apart.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Fixed spacing, in seconds, between queued requests while in `rate_limited` mode.
    pub request_interval_secs: u64,
    /// Base of the exponential backoff applied to repeated 429s within `rate_limited` mode.
    pub backoff_base_secs: u64,
    /// Ceiling on the exponential backoff, in seconds.
    pub backoff_cap_secs: u64,
    /// Consecutive successes in `rate_limited` mode required to enter `recovering`.
    pub successes_to_recover: u32,
    /// Time in `rate_limited` mode, in seconds, after which recovery starts regardless of
    /// success count.
    pub recovery_timeout_secs: u64,
    /// Inter-request spacing, in seconds, for each step of `recovering`, in order.
    pub recovery_steps_secs: Vec<u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            request_interval_secs: 10,
            backoff_base_secs: 10,
            backoff_cap_secs: 120,
            successes_to_recover: 5,
            recovery_timeout_secs: 10 * 60,
            recovery_steps_secs: vec![5, 2, 1, 0],
        }
    }
}

impl RateLimitConfig {
    /// Checks cross-field invariants not expressible through `serde` alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.recovery_steps_secs.is_empty() {
            anyhow::bail!("rate_limit.recovery_steps_secs must not be empty");
        }
        Ok(())
    }
}

impl From<&RateLimitConfig> for ratelimit::RateLimiterConfig {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            request_interval: Duration::from_secs(config.request_interval_secs),
            backoff_base: Duration::from_secs(config.backoff_base_secs),
            backoff_cap: Duration::from_secs(config.backoff_cap_secs),
            successes_to_recover: config.successes_to_recover,
            recovery_timeout: Duration::from_secs(config.recovery_timeout_secs),
            recovery_steps: config.recovery_steps_secs.iter().copied().map(Duration::from_secs).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_ratelimit_crate_default() {
        let config = RateLimitConfig::default();
        let converted: ratelimit::RateLimiterConfig = (&config).into();
        let native = ratelimit::RateLimiterConfig::default();
        assert_eq!(converted.request_interval, native.request_interval);
        assert_eq!(converted.recovery_steps, native.recovery_steps);
    }

    #[test]
    fn empty_recovery_steps_fails_validation() {
        let config = RateLimitConfig { recovery_steps_secs: vec![], ..RateLimitConfig::default() };
        assert!(config.validate().is_err());
    }
}
