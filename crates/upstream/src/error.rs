use thiserror::Error;

/// Failure surfaced by any upstream call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned {status_code}: {body_text}")]
    Http {
        status_code: u16,
        body_text: String,
        model_id: Option<String>,
        /// Seconds from the `Retry-After` response header, when upstream sent one.
        retry_after_seconds: Option<u64>,
    },

    #[error("failed to reach upstream: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("failed to parse upstream response: {0}")]
    Decode(String),

    #[error("device code expired before authorization completed")]
    DeviceCodeExpired,
}

impl UpstreamError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn model_id(&self) -> Option<&str> {
        match self {
            Self::Http { model_id, .. } => model_id.as_deref(),
            _ => None,
        }
    }

    pub fn body_text(&self) -> Option<&str> {
        match self {
            Self::Http { body_text, .. } => Some(body_text),
            _ => None,
        }
    }

    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::Http { retry_after_seconds, .. } => *retry_after_seconds,
            _ => None,
        }
    }
}
