//! Recognizes a 429 regardless of whether upstream signaled it via status code or error body.

use serde_json::Value;
use upstream::UpstreamError;

/// True if `error` is a rate-limit rejection: HTTP 429, or a decodable body with
/// `error.code == "rate_limited"`.
pub fn is_rate_limited(error: &UpstreamError) -> bool {
    let Some(status_code) = error.status_code() else {
        return false;
    };
    if status_code == 429 {
        return true;
    }
    error_code(error).as_deref() == Some("rate_limited")
}

/// Seconds to wait before retrying, preferring the `Retry-After` header over a body field.
pub fn retry_after_seconds(error: &UpstreamError) -> Option<u64> {
    error.retry_after_seconds().or_else(|| retry_after_from_body(error))
}

fn error_code(error: &UpstreamError) -> Option<String> {
    let body: Value = serde_json::from_str(error.body_text()?).ok()?;
    body.get("error")?.get("code")?.as_str().map(str::to_string)
}

fn retry_after_from_body(error: &UpstreamError) -> Option<u64> {
    let body: Value = serde_json::from_str(error.body_text()?).ok()?;
    body.get("retry_after").and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_error(status_code: u16, body_text: &str) -> UpstreamError {
        UpstreamError::Http {
            status_code,
            body_text: body_text.to_string(),
            model_id: None,
            retry_after_seconds: None,
        }
    }

    #[test]
    fn status_429_is_rate_limited() {
        assert!(is_rate_limited(&http_error(429, "{}")));
    }

    #[test]
    fn error_code_rate_limited_is_recognized_on_other_statuses() {
        let error = http_error(400, r#"{"error":{"code":"rate_limited"}}"#);
        assert!(is_rate_limited(&error));
    }

    #[test]
    fn unrelated_errors_are_not_rate_limited() {
        assert!(!is_rate_limited(&http_error(500, "internal error")));
    }

    #[test]
    fn retry_after_prefers_header_over_body() {
        let error = UpstreamError::Http {
            status_code: 429,
            body_text: r#"{"retry_after":30}"#.to_string(),
            model_id: None,
            retry_after_seconds: Some(7),
        };
        assert_eq!(retry_after_seconds(&error), Some(7));
    }

    #[test]
    fn retry_after_falls_back_to_body_field() {
        let error = http_error(429, r#"{"retry_after":30}"#);
        assert_eq!(retry_after_seconds(&error), Some(30));
    }
}
