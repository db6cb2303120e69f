//! Adaptive rate limiting for the upstream gateway: immediate execution in the common case,
//! falling back to a serialized, backed-off queue for the duration of a 429 episode.

mod classify;
pub mod config;
mod limiter;

pub use config::RateLimiterConfig;
pub use limiter::{Mode, RateLimitedResult, RateLimiter};
