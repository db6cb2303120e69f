use std::pin::Pin;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use protocol::anthropic::{AnthropicChatRequest, AnthropicChatResponse, AnthropicStreamEvent};
use protocol::openai::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole};
use protocol::unified::UnifiedObjectType;
use reqwest::{Client, Method, header::AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::device_auth::{AccessTokenPollResponse, AccessTokenRequest, DeviceCodeRequest, DeviceCodeResponse, ShortTokenResponse};
use crate::error::UpstreamError;
use crate::http_client::build_http_client;
use crate::model::Model;

const DEFAULT_API_BASE: &str = "https://api.githubcopilot.com";
const DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
const ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, UpstreamError>> + Send>>;
pub type AnthropicEventStream = Pin<Box<dyn Stream<Item = Result<AnthropicStreamEvent, UpstreamError>> + Send>>;

/// A chat-completions response, streaming or not.
pub enum ChatCompletionsResponse {
    Sync(ChatCompletionResponse),
    Stream(ChunkStream),
}

/// A native Anthropic Messages response, streaming or not.
pub enum AnthropicMessagesResponse {
    Sync(AnthropicChatResponse),
    Stream(AnthropicEventStream),
}

/// Thin HTTP client for the upstream LLM gateway, keyed by the caller-supplied short-lived token.
///
/// Holds no auth state of its own — the credential manager owns the token's lifecycle and
/// passes the current value into every call.
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    client_id: String,
}

impl UpstreamClient {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            http: build_http_client(),
            base_url: DEFAULT_API_BASE.to_string(),
            client_id: client_id.into(),
        }
    }

    /// Overrides the API base URL, as returned by `exchange_for_short_token`'s `endpoints.api`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn request_device_code(&self) -> Result<DeviceCodeResponse, UpstreamError> {
        let response = self
            .http
            .post(DEVICE_CODE_URL)
            .header("Accept", "application/json")
            .json(&DeviceCodeRequest {
                client_id: &self.client_id,
                scope: "read:user",
            })
            .send()
            .await?;

        decode_or_error(response, None).await
    }

    /// Polls for the long-lived token until the user authorizes or the device code expires.
    pub async fn poll_access_token(&self, device_code: &str, interval: u64) -> Result<String, UpstreamError> {
        let mut delay = Duration::from_secs(interval.max(1));

        loop {
            tokio::time::sleep(delay).await;

            let response = self
                .http
                .post(ACCESS_TOKEN_URL)
                .header("Accept", "application/json")
                .json(&AccessTokenRequest {
                    client_id: &self.client_id,
                    device_code,
                    grant_type: "urn:ietf:params:oauth:grant-type:device_code",
                })
                .send()
                .await?;

            let poll: AccessTokenPollResponse = decode_or_error(response, None).await?;
            match poll {
                AccessTokenPollResponse::Success { access_token } => return Ok(access_token),
                AccessTokenPollResponse::Pending { error, .. } if error == "authorization_pending" => continue,
                AccessTokenPollResponse::Pending { error, .. } if error == "slow_down" => {
                    delay += Duration::from_secs(5);
                }
                AccessTokenPollResponse::Pending { error, .. } if error == "expired_token" => {
                    return Err(UpstreamError::DeviceCodeExpired);
                }
                AccessTokenPollResponse::Pending { error, error_description } => {
                    return Err(UpstreamError::Decode(error_description.unwrap_or(error)));
                }
            }
        }
    }

    pub async fn exchange_for_short_token(&self, long_lived_token: &SecretString) -> Result<ShortTokenResponse, UpstreamError> {
        let response = self
            .http
            .get(format!("{}/copilot_internal/v2/token", self.base_url))
            .bearer_auth(long_lived_token.expose_secret())
            .send()
            .await?;

        decode_or_error(response, None).await
    }

    pub async fn list_models(&self, short_token: &SecretString) -> Result<Vec<Model>, UpstreamError> {
        #[derive(serde::Deserialize)]
        struct ModelsEnvelope {
            data: Vec<protocol::unified::UnifiedModel>,
        }

        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(short_token.expose_secret())
            .send()
            .await?;

        let envelope: ModelsEnvelope = decode_or_error(response, None).await?;
        Ok(envelope
            .data
            .into_iter()
            .map(|m| crate::model::Model {
                id: m.id,
                vendor: if m.object_type == UnifiedObjectType::Message {
                    crate::model::Vendor::Anthropic
                } else {
                    crate::model::Vendor::OpenAi
                },
                display_name: m.display_name,
                capabilities: crate::model::ModelCapabilities::default(),
            })
            .collect())
    }

    /// `has_vision_content` is decided by the caller from the pre-translation request, since by
    /// the time a message reaches this wire shape image parts have already been flattened away.
    pub async fn chat_completions(
        &self,
        short_token: &SecretString,
        payload: ChatCompletionRequest,
        stream: bool,
        has_vision_content: bool,
    ) -> Result<ChatCompletionsResponse, UpstreamError> {
        let initiator = initiator_for(&payload.messages);
        let mut payload = payload;
        payload.stream = Some(stream);

        let mut request = self
            .request_builder(Method::POST, "/chat/completions", short_token)
            .header("X-Initiator", initiator)
            .json(&payload);

        if has_vision_content {
            request = request.header("Copilot-Vision-Request", "true");
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(response, Some(payload.model.clone())).await);
        }

        if !stream {
            let body: ChatCompletionResponse = response.json().await.map_err(UpstreamError::Connection)?;
            return Ok(ChatCompletionsResponse::Sync(body));
        }

        Ok(ChatCompletionsResponse::Stream(Box::pin(sse_chunks(response))))
    }

    pub async fn anthropic_messages(
        &self,
        short_token: &SecretString,
        payload: AnthropicChatRequest,
        stream: bool,
    ) -> Result<AnthropicMessagesResponse, UpstreamError> {
        let mut payload = payload;
        payload.stream = Some(stream);
        let model = payload.model.clone();

        let response = self
            .request_builder(Method::POST, "/messages", short_token)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(http_error(response, Some(model)).await);
        }

        if !stream {
            let body: AnthropicChatResponse = response.json().await.map_err(UpstreamError::Connection)?;
            return Ok(AnthropicMessagesResponse::Sync(body));
        }

        Ok(AnthropicMessagesResponse::Stream(Box::pin(sse_anthropic_events(response))))
    }

    pub async fn embeddings(&self, short_token: &SecretString, payload: Value) -> Result<Value, UpstreamError> {
        let response = self
            .request_builder(Method::POST, "/embeddings", short_token)
            .json(&payload)
            .send()
            .await?;

        decode_or_error(response, None).await
    }

    pub async fn usage(&self, short_token: &SecretString) -> Result<Value, UpstreamError> {
        let response = self.request_builder(Method::GET, "/usage", short_token).send().await?;
        decode_or_error(response, None).await
    }

    fn request_builder(&self, method: Method, path: &str, short_token: &SecretString) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", short_token.expose_secret()))
    }
}

/// `agent` if any message came from the assistant or a tool, else `user`.
fn initiator_for(messages: &[ChatMessage]) -> &'static str {
    if messages.iter().any(|m| matches!(m.role, ChatRole::Assistant | ChatRole::Tool)) {
        "agent"
    } else {
        "user"
    }
}

fn sse_chunks(response: reqwest::Response) -> impl Stream<Item = Result<ChatCompletionChunk, UpstreamError>> {
    response.bytes_stream().eventsource().filter_map(|event| async move {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                log::warn!("SSE parsing error in upstream chat completion stream: {err}");
                return None;
            }
        };
        if event.data == "[DONE]" {
            return None;
        }
        match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
            Ok(chunk) => Some(Ok(chunk)),
            Err(err) => {
                log::warn!("failed to parse upstream chat completion chunk: {err}");
                None
            }
        }
    })
}

fn sse_anthropic_events(response: reqwest::Response) -> impl Stream<Item = Result<AnthropicStreamEvent, UpstreamError>> {
    response.bytes_stream().eventsource().filter_map(|event| async move {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                log::warn!("SSE parsing error in upstream Anthropic message stream: {err}");
                return None;
            }
        };
        match serde_json::from_str::<AnthropicStreamEvent>(&event.data) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                log::warn!("failed to parse upstream Anthropic stream event: {err}");
                None
            }
        }
    })
}

async fn http_error(response: reqwest::Response, model_id: Option<String>) -> UpstreamError {
    let status_code = response.status().as_u16();
    let retry_after_seconds = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok());
    let body_text = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
    UpstreamError::Http {
        status_code,
        body_text,
        model_id,
        retry_after_seconds,
    }
}

async fn decode_or_error<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    model_id: Option<String>,
) -> Result<T, UpstreamError> {
    let status = response.status();
    if !status.is_success() {
        return Err(http_error(response, model_id).await);
    }
    let text = response.text().await.map_err(UpstreamError::Connection)?;
    serde_json::from_str(&text).map_err(|err| UpstreamError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: ChatRole) -> ChatMessage {
        ChatMessage {
            role,
            content: Some("hi".to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[test]
    fn initiator_is_user_for_plain_conversation() {
        assert_eq!(initiator_for(&[message(ChatRole::User)]), "user");
    }

    #[test]
    fn initiator_is_agent_when_assistant_present() {
        assert_eq!(initiator_for(&[message(ChatRole::User), message(ChatRole::Assistant)]), "agent");
    }

    #[test]
    fn initiator_is_agent_when_tool_present() {
        assert_eq!(initiator_for(&[message(ChatRole::User), message(ChatRole::Tool)]), "agent");
    }

    #[test]
    fn new_client_defaults_to_github_copilot_api() {
        let client = UpstreamClient::new("test-client-id");
        assert_eq!(client.base_url, DEFAULT_API_BASE);
    }

    #[test]
    fn with_base_url_overrides_default() {
        let client = UpstreamClient::new("test-client-id").with_base_url("https://example.test");
        assert_eq!(client.base_url, "https://example.test");
    }
}
