//! HTTP client for the upstream LLM gateway: device-code auth, chat completions, and model
//! listing. Stateless beyond the configured base URL — the caller supplies the current
//! short-lived token on every call.

pub mod client;
pub mod device_auth;
pub mod error;
mod http_client;
pub mod model;

pub use client::{AnthropicMessagesResponse, ChatCompletionsResponse, UpstreamClient};
pub use error::UpstreamError;
pub use model::{Model, ModelCapabilities, Vendor};
