//! Three-state adaptive rate limiter: `normal` executes immediately, `rate_limited` serializes
//! through a FIFO gate with backoff, `recovering` ramps back down to `normal` on sustained success.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use upstream::UpstreamError;

use crate::classify;
use crate::config::RateLimiterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    RateLimited,
    Recovering,
}

/// The outcome of a rate-limited call, annotated with how long it waited in the queue.
pub struct RateLimitedResult<T> {
    pub value: Result<T, UpstreamError>,
    pub queue_wait_ms: u64,
}

struct State {
    mode: Mode,
    retry_count: u32,
    consecutive_successes: u32,
    rate_limited_since: Option<Instant>,
    recovery_step_index: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            retry_count: 0,
            consecutive_successes: 0,
            rate_limited_since: None,
            recovery_step_index: 0,
        }
    }
}

impl State {
    fn enter_rate_limited(&mut self) {
        self.mode = Mode::RateLimited;
        self.retry_count = 0;
        self.consecutive_successes = 0;
        self.rate_limited_since = Some(Instant::now());
    }

    /// A queued call that did not come back as a 429 (whether it succeeded or failed some other
    /// way). Advances `recovering`'s step list, or counts towards leaving `rate_limited`.
    fn on_queued_non_rate_limited_outcome(&mut self, config: &RateLimiterConfig) -> Duration {
        match self.mode {
            Mode::RateLimited => {
                self.consecutive_successes += 1;
                self.retry_count = 0;
                let timed_out = self.rate_limited_since.is_some_and(|since| since.elapsed() >= config.recovery_timeout);
                if self.consecutive_successes >= config.successes_to_recover || timed_out {
                    self.mode = Mode::Recovering;
                    self.recovery_step_index = 0;
                }
                config.request_interval
            }
            Mode::Recovering => {
                let step = config.recovery_steps.get(self.recovery_step_index).copied().unwrap_or(Duration::ZERO);
                self.recovery_step_index += 1;
                if self.recovery_step_index >= config.recovery_steps.len() {
                    self.mode = Mode::Normal;
                }
                step
            }
            Mode::Normal => Duration::ZERO,
        }
    }

    /// A queued call that came back 429. Stays in (or re-enters) `rate_limited` and backs off.
    fn on_queued_rate_limited_failure(&mut self, config: &RateLimiterConfig, retry_after: Option<Duration>) -> Duration {
        if self.mode != Mode::RateLimited {
            self.rate_limited_since = Some(Instant::now());
        }
        self.mode = Mode::RateLimited;
        self.consecutive_successes = 0;

        let wait = retry_after.unwrap_or_else(|| {
            let factor = 2u32.checked_pow(self.retry_count).unwrap_or(u32::MAX);
            config.backoff_base.checked_mul(factor).unwrap_or(config.backoff_cap).min(config.backoff_cap)
        });
        self.retry_count = self.retry_count.saturating_add(1);
        wait
    }
}

/// Serializes and paces calls to an upstream that enforces rate limits, re-queuing (never
/// failing) requests that arrive during a 429 episode.
pub struct RateLimiter {
    state: Mutex<State>,
    queue_gate: AsyncMutex<Instant>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            queue_gate: AsyncMutex::new(Instant::now()),
            config,
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.lock().expect("rate limiter state lock poisoned").mode
    }

    /// Runs `call`, retrying internally while upstream keeps reporting 429s. `call` may be
    /// invoked more than once; it must be safe to call again (e.g. the request body is cheap to
    /// rebuild or already owned by the closure).
    ///
    /// Cancellation-safe: dropping the returned future before it resolves releases the queue
    /// gate without having executed a pending call, satisfying the "drains without executing"
    /// requirement for abandoned queued requests.
    pub async fn execute<F, Fut, T>(&self, mut call: F) -> RateLimitedResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let enqueued_at = Instant::now();

        loop {
            if self.mode() == Mode::Normal {
                match call().await {
                    Ok(value) => return RateLimitedResult { value: Ok(value), queue_wait_ms: 0 },
                    Err(err) if classify::is_rate_limited(&err) => {
                        self.state.lock().expect("rate limiter state lock poisoned").enter_rate_limited();
                        log::warn!("upstream rate limit observed in normal mode, re-queuing request");
                        continue;
                    }
                    Err(err) => return RateLimitedResult { value: Err(err), queue_wait_ms: 0 },
                }
            }

            let mut next_allowed = self.queue_gate.lock().await;
            let queue_wait_ms = enqueued_at.elapsed().as_millis() as u64;
            tokio::time::sleep_until(*next_allowed).await;

            let result = call().await;
            let delay = {
                let mut state = self.state.lock().expect("rate limiter state lock poisoned");
                match &result {
                    Err(err) if classify::is_rate_limited(err) => {
                        let retry_after = classify::retry_after_seconds(err).map(Duration::from_secs);
                        state.on_queued_rate_limited_failure(&self.config, retry_after)
                    }
                    _ => state.on_queued_non_rate_limited_outcome(&self.config),
                }
            };
            *next_allowed = Instant::now() + delay;
            drop(next_allowed);

            match result {
                Err(err) if classify::is_rate_limited(&err) => {
                    log::warn!("upstream rate limit observed while queued, retrying after backoff");
                    continue;
                }
                other => return RateLimitedResult { value: other, queue_wait_ms },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited_error() -> UpstreamError {
        UpstreamError::Http {
            status_code: 429,
            body_text: "{}".to_string(),
            model_id: None,
            retry_after_seconds: None,
        }
    }

    #[tokio::test]
    async fn successful_call_in_normal_mode_executes_immediately() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        let result = limiter.execute(|| async { Ok::<_, UpstreamError>(42) }).await;
        assert_eq!(result.value.unwrap(), 42);
        assert_eq!(result.queue_wait_ms, 0);
        assert_eq!(limiter.mode(), Mode::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn a_429_in_normal_mode_enters_rate_limited_and_retries_until_success() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        let attempts = AtomicU32::new(0);

        let result = limiter
            .execute(|| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(rate_limited_error())
                    } else {
                        Ok::<_, UpstreamError>("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.value.unwrap(), "recovered");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_success_in_rate_limited_mode_transitions_to_recovering_then_normal() {
        let config = RateLimiterConfig {
            successes_to_recover: 2,
            recovery_steps: vec![Duration::ZERO, Duration::ZERO],
            request_interval: Duration::ZERO,
            ..RateLimiterConfig::default()
        };
        let limiter = RateLimiter::new(config);
        limiter.state.lock().unwrap().enter_rate_limited();

        for _ in 0..2 {
            let result = limiter.execute(|| async { Ok::<_, UpstreamError>(()) }).await;
            assert!(result.value.is_ok());
        }
        assert_eq!(limiter.mode(), Mode::Recovering);

        for _ in 0..2 {
            let result = limiter.execute(|| async { Ok::<_, UpstreamError>(()) }).await;
            assert!(result.value.is_ok());
        }
        assert_eq!(limiter.mode(), Mode::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn a_429_while_recovering_falls_back_to_rate_limited() {
        let config = RateLimiterConfig {
            recovery_steps: vec![Duration::ZERO],
            request_interval: Duration::ZERO,
            ..RateLimiterConfig::default()
        };
        let limiter = RateLimiter::new(config);
        {
            let mut state = limiter.state.lock().unwrap();
            state.mode = Mode::Recovering;
            state.recovery_step_index = 0;
        }

        let attempts = AtomicU32::new(0);
        let result = limiter
            .execute(|| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(rate_limited_error())
                    } else {
                        Ok::<_, UpstreamError>(())
                    }
                }
            })
            .await;

        assert!(result.value.is_ok());
    }

    #[tokio::test]
    async fn non_rate_limit_errors_are_not_retried() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        let error = UpstreamError::Http {
            status_code: 500,
            body_text: "boom".to_string(),
            model_id: None,
            retry_after_seconds: None,
        };
        let result = limiter.execute(|| async { Err::<(), _>(error_clone(&error)) }).await;
        assert!(result.value.is_err());
        assert_eq!(limiter.mode(), Mode::Normal);
    }

    fn error_clone(error: &UpstreamError) -> UpstreamError {
        match error {
            UpstreamError::Http { status_code, body_text, model_id, retry_after_seconds } => UpstreamError::Http {
                status_code: *status_code,
                body_text: body_text.clone(),
                model_id: model_id.clone(),
                retry_after_seconds: *retry_after_seconds,
            },
            _ => unreachable!("test only constructs Http errors"),
        }
    }
}
