//! Client-visible error taxonomy (§7) and the Error Normalizer (§4.H) that maps an
//! [`UpstreamError`] onto it, feeding the dynamic-limit registry along the way.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use compactor::DynamicLimitRegistry;
use serde_json::json;
use upstream::UpstreamError;

/// A client-visible error, independent of which wire protocol renders it.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    RateLimit { message: String },

    #[error("{message}")]
    TokenLimitExceeded { message: String },

    #[error("{message}")]
    RequestTooLarge { message: String },

    #[error("upstream returned HTTP {status_code}: {message}")]
    UpstreamHttp { status_code: u16, message: String },

    #[error("upstream stream error: {message}")]
    UpstreamStream { message: String },

    #[error("{message}")]
    AuthFailure { message: String },

    #[error("{message}")]
    Internal { message: String },
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::TokenLimitExceeded { .. } | Self::RequestTooLarge { .. } => StatusCode::BAD_REQUEST,
            Self::UpstreamHttp { status_code, .. } => {
                StatusCode::from_u16(*status_code).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::UpstreamStream { .. } => StatusCode::BAD_GATEWAY,
            Self::AuthFailure { .. } => StatusCode::UNAUTHORIZED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn taxonomy_tag(&self) -> &'static str {
        match self {
            Self::RateLimit { .. } => "rate_limit",
            Self::TokenLimitExceeded { .. } => "token_limit_exceeded",
            Self::RequestTooLarge { .. } => "request_too_large",
            Self::UpstreamHttp { .. } => "upstream_http_error",
            Self::UpstreamStream { .. } => "upstream_stream_error",
            Self::AuthFailure { .. } => "auth_failure",
            Self::Internal { .. } => "internal_error",
        }
    }

    fn openai_error_type(&self) -> &'static str {
        match self {
            Self::RateLimit { .. } => "rate_limit_error",
            Self::TokenLimitExceeded { .. } | Self::RequestTooLarge { .. } => "invalid_request_error",
            _ => "error",
        }
    }

    /// Renders this error as an Anthropic-shaped `{type, error: {type, message}}` body.
    pub fn into_anthropic_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.openai_error_type();
        let message = self.to_string();
        (status, Json(json!({ "type": "error", "error": { "type": error_type, "message": message } }))).into_response()
    }

    /// Renders a single Anthropic SSE `error` event, for streams that fail mid-flight.
    pub fn into_anthropic_stream_event(&self) -> protocol::anthropic::AnthropicStreamEvent {
        protocol::streaming::StreamTranslator::error_event(self.to_string())
    }
}

impl IntoResponse for ApiError {
    /// Defaults to the OpenAI-shaped `{error: {message, type, code}}` body; Anthropic routes
    /// call [`ApiError::into_anthropic_response`] explicitly instead.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.taxonomy_tag();
        let error_type = self.openai_error_type();
        let message = self.to_string();
        (status, Json(json!({ "error": { "message": message, "type": error_type, "code": code } }))).into_response()
    }
}

/// Normalizes an [`UpstreamError`] into the client-visible taxonomy, latching the dynamic-limit
/// registry when the error carries a byte- or token-limit hint (§4.H).
pub fn normalize_upstream_error(error: UpstreamError, limits: &DynamicLimitRegistry, model_id: &str) -> ApiError {
    let Some(status_code) = error.status_code() else {
        return ApiError::UpstreamStream { message: error.to_string() };
    };

    if status_code == 413 {
        let failing_bytes = error.body_text().map(str::len).unwrap_or(0) as u64;
        limits.record_payload_too_large(failing_bytes);
        return ApiError::RequestTooLarge { message: "Request body too large for upstream".to_string() };
    }

    if let Some((current, limit)) = parse_prompt_too_long(error.body_text().unwrap_or_default()) {
        limits.record_token_limit_exceeded(model_id, limit);
        return ApiError::TokenLimitExceeded {
            message: format!("prompt is too long: {current} tokens > {limit} maximum"),
        };
    }

    if status_code == 429 || error.body_text().unwrap_or_default().contains(r#""code":"rate_limited""#) {
        return ApiError::RateLimit { message: "upstream rate limit exceeded".to_string() };
    }

    ApiError::UpstreamHttp { status_code, message: error.body_text().unwrap_or_default().to_string() }
}

/// Recognizes both the OpenAI-surface `model_max_prompt_tokens_exceeded` error code and the
/// Anthropic-surface `prompt is too long: N tokens > M maximum` free-text message.
fn parse_prompt_too_long(body_text: &str) -> Option<(u32, u32)> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body_text) {
        let error = value.get("error")?;
        if error.get("code").and_then(|c| c.as_str()) == Some("model_max_prompt_tokens_exceeded") {
            let current = error.get("current").and_then(|v| v.as_u64())? as u32;
            let limit = error.get("limit").and_then(|v| v.as_u64())? as u32;
            return Some((current, limit));
        }
        if let Some(message) = error.get("message").and_then(|m| m.as_str())
            && let Some(pair) = parse_prompt_too_long_message(message)
        {
            return Some(pair);
        }
    }
    parse_prompt_too_long_message(body_text)
}

fn parse_prompt_too_long_message(message: &str) -> Option<(u32, u32)> {
    let rest = message.strip_prefix("prompt is too long: ")?;
    let (current_str, rest) = rest.split_once(" tokens > ")?;
    let (limit_str, _) = rest.split_once(" maximum")?;
    Some((current_str.trim().parse().ok()?, limit_str.trim().parse().ok()?))
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
    fn status_413_latches_byte_limit_and_surfaces_invalid_request() {
        let limits = DynamicLimitRegistry::new();
        let body = "x".repeat(600_000);
        let error = normalize_upstream_error(http_error(413, &body), &limits, "gpt-4o");
        assert!(matches!(error, ApiError::RequestTooLarge { .. }));
        assert_eq!(limits.effective_byte_limit(), Some(540_000));
    }

    #[test]
    fn anthropic_prompt_too_long_message_latches_token_limit() {
        let limits = DynamicLimitRegistry::new();
        let body = r#"{"error":{"message":"prompt is too long: 210000 tokens > 200000 maximum"}}"#;
        let error = normalize_upstream_error(http_error(400, body), &limits, "claude-3-opus");
        assert!(matches!(error, ApiError::TokenLimitExceeded { .. }));
        assert_eq!(limits.effective_token_limit("claude-3-opus", 200_000), 190_000);
    }

    #[test]
    fn status_429_surfaces_rate_limit_error() {
        let limits = DynamicLimitRegistry::new();
        let error = normalize_upstream_error(http_error(429, "{}"), &limits, "gpt-4o");
        assert!(matches!(error, ApiError::RateLimit { .. }));
    }

    #[test]
    fn unrecognized_errors_pass_through_as_upstream_http() {
        let limits = DynamicLimitRegistry::new();
        let error = normalize_upstream_error(http_error(500, "boom"), &limits, "gpt-4o");
        assert!(matches!(error, ApiError::UpstreamHttp { status_code: 500, .. }));
    }
}
