//! Dynamic-limit registry: two caches refined by upstream error feedback.

use std::collections::HashMap;
use std::sync::Mutex;

const MIN_BYTE_LIMIT: u64 = 100 * 1024;
const BYTE_LIMIT_LATCH_FRACTION: f64 = 0.90;
const TOKEN_LIMIT_LATCH_FRACTION: f64 = 0.95;

/// Tracks the largest upstream-reported payload-too-large and token-limit-exceeded failures,
/// latching future effective limits a safety margin below them.
pub struct DynamicLimitRegistry {
    byte_limit: Mutex<Option<u64>>,
    token_limits: Mutex<HashMap<String, u32>>,
}

impl DynamicLimitRegistry {
    pub fn new() -> Self {
        Self {
            byte_limit: Mutex::new(None),
            token_limits: Mutex::new(HashMap::new()),
        }
    }

    /// Byte budget to compact against, floored at 100 KB. `None` until the first 413.
    pub fn effective_byte_limit(&self) -> Option<u64> {
        *self.byte_limit.lock().expect("byte limit lock poisoned")
    }

    /// Token budget for `model_id`, falling back to the model's own context window.
    pub fn effective_token_limit(&self, model_id: &str, max_context_window_tokens: u32) -> u32 {
        self.token_limits
            .lock()
            .expect("token limits lock poisoned")
            .get(model_id)
            .copied()
            .unwrap_or(max_context_window_tokens)
    }

    /// Records a payload-too-large failure, latching the byte limit to 90% of the failing size.
    pub fn record_payload_too_large(&self, failing_payload_bytes: u64) {
        let candidate = ((failing_payload_bytes as f64) * BYTE_LIMIT_LATCH_FRACTION) as u64;
        let candidate = candidate.max(MIN_BYTE_LIMIT);

        let mut guard = self.byte_limit.lock().expect("byte limit lock poisoned");
        *guard = Some(guard.map_or(candidate, |current| current.max(candidate)));
    }

    /// Records a token-limit-exceeded failure for `model_id`, latching to 95% of the reported limit.
    pub fn record_token_limit_exceeded(&self, model_id: &str, reported_limit: u32) {
        let candidate = ((reported_limit as f64) * TOKEN_LIMIT_LATCH_FRACTION) as u32;

        let mut guard = self.token_limits.lock().expect("token limits lock poisoned");
        guard
            .entry(model_id.to_string())
            .and_modify(|existing| *existing = (*existing).max(candidate))
            .or_insert(candidate);
    }
}

impl Default for DynamicLimitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_limit_is_none_until_a_failure_is_recorded() {
        let registry = DynamicLimitRegistry::new();
        assert_eq!(registry.effective_byte_limit(), None);
    }

    #[test]
    fn payload_too_large_latches_to_90_percent() {
        let registry = DynamicLimitRegistry::new();
        registry.record_payload_too_large(1_000_000);
        assert_eq!(registry.effective_byte_limit(), Some(900_000));
    }

    #[test]
    fn byte_limit_never_drops_below_the_floor() {
        let registry = DynamicLimitRegistry::new();
        registry.record_payload_too_large(10_000);
        assert_eq!(registry.effective_byte_limit(), Some(MIN_BYTE_LIMIT));
    }

    #[test]
    fn byte_limit_only_ever_increases() {
        let registry = DynamicLimitRegistry::new();
        registry.record_payload_too_large(1_000_000);
        registry.record_payload_too_large(500_000);
        assert_eq!(registry.effective_byte_limit(), Some(900_000));
    }

    #[test]
    fn token_limit_falls_back_to_context_window_for_unknown_model() {
        let registry = DynamicLimitRegistry::new();
        assert_eq!(registry.effective_token_limit("gpt-4o", 128_000), 128_000);
    }

    #[test]
    fn token_limit_exceeded_latches_to_95_percent() {
        let registry = DynamicLimitRegistry::new();
        registry.record_token_limit_exceeded("gpt-4o", 100_000);
        assert_eq!(registry.effective_token_limit("gpt-4o", 128_000), 95_000);
    }
}
