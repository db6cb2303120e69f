//! Per-request translate/compact/rate-limit/dispatch pipeline shared by the OpenAI and
//! Anthropic routes (§4.I).

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::time::Instant;

use compactor::{CompactionOptions, compact_request};
use futures::{Stream, StreamExt};
use protocol::anthropic::{AnthropicChatRequest, AnthropicChatResponse, AnthropicStreamEvent};
use protocol::openai::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse};
use protocol::streaming::StreamTranslator;
use protocol::tool_name::ToolNameMap;
use protocol::unified::{UnifiedContent, UnifiedContentContainer, UnifiedRequest};
use secrecy::SecretString;
use upstream::client::{AnthropicMessagesResponse, ChatCompletionsResponse, ChunkStream};
use upstream::model::{ModelCapabilities, Vendor};

use crate::context::AppContext;
use crate::error::{ApiError, normalize_upstream_error};

/// Outcome of a dispatched OpenAI-shaped chat completion.
pub enum OpenAiOutcome {
    Sync(Box<ChatCompletionResponse>),
    Stream(Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, ApiError>> + Send>>),
}

/// Outcome of a dispatched Anthropic-shaped message.
pub enum AnthropicOutcome {
    Sync(Box<AnthropicChatResponse>),
    Stream(Pin<Box<dyn Stream<Item = AnthropicStreamEvent> + Send>>),
}

fn capabilities_for(ctx: &AppContext, model_id: &str) -> ModelCapabilities {
    ctx.model(model_id).map(|m| m.capabilities).unwrap_or_default()
}

fn vendor_for(ctx: &AppContext, model_id: &str) -> Vendor {
    ctx.model(model_id).map(|m| m.vendor).unwrap_or(Vendor::OpenAi)
}

/// Resolves a short family alias or strips a dated suffix (§4.F/§4.F.1) before capability
/// lookup and dispatch. No alias table is configured today, so this only strips dates.
fn normalize_model_id(model_id: &str) -> String {
    protocol::model_name::normalize(model_id, &HashMap::new())
}

fn has_vision_content(request: &UnifiedRequest) -> bool {
    request.messages.iter().any(|message| match &message.content {
        UnifiedContentContainer::Blocks(blocks) => blocks.iter().any(|b| matches!(b, UnifiedContent::Image { .. })),
        UnifiedContentContainer::Text(_) => false,
    })
}

/// Truncates every tool name in `request` that exceeds OpenAI's 64-character limit, recording
/// the mapping so the response can restore the original names.
fn truncate_tool_names(request: &mut UnifiedRequest, tool_names: &mut ToolNameMap) {
    if let Some(tools) = &mut request.tools {
        for tool in tools {
            tool.function.name = tool_names.to_upstream(&tool.function.name);
        }
    }

    for message in &mut request.messages {
        if let UnifiedContentContainer::Blocks(blocks) = &mut message.content {
            for block in blocks {
                if let UnifiedContent::ToolUse { name, .. } = block {
                    *name = tool_names.to_upstream(name);
                }
            }
        }
    }
}

fn restore_tool_names_in_response(response: &mut ChatCompletionResponse, tool_names: &ToolNameMap) {
    for choice in &mut response.choices {
        if let Some(tool_calls) = &mut choice.message.tool_calls {
            for call in tool_calls {
                call.function.name = tool_names.from_upstream(&call.function.name);
            }
        }
    }
}

/// Fields of `AnthropicChatRequest` eligible for the direct pass-through allow-list (§4.F,
/// §9 open questions). `model`, `messages`, and `max_tokens` are always required and never
/// dropped.
const ANTHROPIC_PASSTHROUGH_OPTIONAL_FIELDS: &[&str] =
    &["system", "temperature", "top_p", "top_k", "stop_sequences", "stream", "metadata", "tools", "tool_choice", "thinking"];

/// Raises `max_tokens` when it wouldn't leave room for the configured thinking budget (§4.F).
fn bump_max_tokens_for_thinking(payload: &mut AnthropicChatRequest) {
    if let Some(thinking) = &payload.thinking {
        if payload.max_tokens <= thinking.budget_tokens {
            payload.max_tokens = thinking.budget_tokens + thinking.budget_tokens.min(16384);
        }
    }
}

/// Drops any optional field not named in `allowed` before a direct dispatch, logging what was
/// dropped. `None` accepts every field (the default).
fn apply_direct_passthrough_allow_list(payload: &mut AnthropicChatRequest, allowed: Option<&[String]>) {
    let Some(allowed) = allowed else {
        return;
    };

    let is_allowed = |field: &str| allowed.iter().any(|a| a == field);

    for field in ANTHROPIC_PASSTHROUGH_OPTIONAL_FIELDS {
        if is_allowed(field) {
            continue;
        }
        log::debug!("dropping field '{field}' from direct Anthropic pass-through: not in configured allow-list");
        match *field {
            "system" => payload.system = None,
            "temperature" => payload.temperature = None,
            "top_p" => payload.top_p = None,
            "top_k" => payload.top_k = None,
            "stop_sequences" => payload.stop_sequences = None,
            "stream" => payload.stream = None,
            "metadata" => payload.metadata = None,
            "tools" => payload.tools = None,
            "tool_choice" => payload.tool_choice = None,
            "thinking" => payload.thinking = None,
            _ => {}
        }
    }
}

fn compact(ctx: &AppContext, request: UnifiedRequest, model_id: &str, capabilities: &ModelCapabilities, is_anthropic_vendor: bool) -> UnifiedRequest {
    let config = ctx.config();
    if !config.compaction.enabled {
        return request;
    }

    let tokenizer = config.tokenizer.build(Some(&capabilities.tokenizer_name), is_anthropic_vendor);
    let options: CompactionOptions = (&config.compaction).into();
    let outcome = compact_request(request, &tokenizer, ctx.limits(), model_id, capabilities.max_context_window_tokens, &options);

    if outcome.was_compacted {
        log::info!(
            "compacted request for {model_id}: {} -> {} tokens, removed {} messages",
            outcome.original_tokens,
            outcome.compacted_tokens,
            outcome.removed_count
        );
    }

    outcome.request
}

/// Handles `POST /chat/completions`: OpenAI wire in, OpenAI wire out, always via the upstream's
/// OpenAI-shaped endpoint.
pub async fn openai_chat_completions(ctx: &AppContext, mut payload: ChatCompletionRequest, stream: bool) -> Result<OpenAiOutcome, ApiError> {
    let model_id = normalize_model_id(&payload.model);
    payload.model = model_id.clone();
    let capabilities = capabilities_for(ctx, &model_id);
    let is_anthropic_vendor = vendor_for(ctx, &model_id) == Vendor::Anthropic;

    let request: UnifiedRequest = payload.into();
    let request = compact(ctx, request, &model_id, &capabilities, is_anthropic_vendor);
    let vision = has_vision_content(&request);
    let payload: ChatCompletionRequest = request.into();

    let token = ctx.tokens().current_short_token();
    let client = ctx.client().clone();
    let result = ctx
        .rate_limiter()
        .execute(|| {
            let token = token.clone();
            let payload = payload.clone();
            let client = client.clone();
            async move { client.chat_completions(&token, payload, stream, vision).await }
        })
        .await;

    match result.value {
        Ok(ChatCompletionsResponse::Sync(response)) => Ok(OpenAiOutcome::Sync(Box::new(response))),
        Ok(ChatCompletionsResponse::Stream(stream)) => Ok(OpenAiOutcome::Stream(Box::pin(
            stream.map(|chunk| chunk.map_err(|err| ApiError::UpstreamStream { message: err.to_string() })),
        ))),
        Err(err) => Err(normalize_upstream_error(err, ctx.limits(), &model_id)),
    }
}

/// Handles `POST /v1/messages`: Anthropic wire in. Dispatches natively when the target model is
/// Anthropic-vendor and direct passthrough is enabled; otherwise translates through the OpenAI
/// wire shape (§4.F).
pub async fn anthropic_messages(ctx: &AppContext, mut payload: AnthropicChatRequest, stream: bool) -> Result<AnthropicOutcome, ApiError> {
    let model_id = normalize_model_id(&payload.model);
    payload.model = model_id.clone();
    let capabilities = capabilities_for(ctx, &model_id);
    let is_anthropic_vendor = vendor_for(ctx, &model_id) == Vendor::Anthropic;
    let direct_passthrough = is_anthropic_vendor && ctx.config().server.anthropic_direct_passthrough_enabled;

    let request: UnifiedRequest = payload.into();
    let request = compact(ctx, request, &model_id, &capabilities, is_anthropic_vendor);

    let token = ctx.tokens().current_short_token();
    let client = ctx.client().clone();

    if direct_passthrough {
        let mut payload: AnthropicChatRequest = request.into();
        bump_max_tokens_for_thinking(&mut payload);
        apply_direct_passthrough_allow_list(&mut payload, ctx.config().server.anthropic_direct_passthrough_allowed_fields.as_deref());
        let result = ctx
            .rate_limiter()
            .execute(|| {
                let token = token.clone();
                let payload = payload.clone();
                let client = client.clone();
                async move { client.anthropic_messages(&token, payload, stream).await }
            })
            .await;

        return match result.value {
            Ok(AnthropicMessagesResponse::Sync(response)) => Ok(AnthropicOutcome::Sync(Box::new(response))),
            Ok(AnthropicMessagesResponse::Stream(stream)) => {
                Ok(AnthropicOutcome::Stream(Box::pin(stream.map(|event| event.unwrap_or_else(|err| StreamTranslator::error_event(err.to_string()))))))
            }
            Err(err) => Err(normalize_upstream_error(err, ctx.limits(), &model_id)),
        };
    }

    let mut tool_names = ToolNameMap::new();
    let mut request = request;
    truncate_tool_names(&mut request, &mut tool_names);
    let vision = has_vision_content(&request);
    let payload: ChatCompletionRequest = request.into();

    let result = ctx
        .rate_limiter()
        .execute(|| {
            let token = token.clone();
            let payload = payload.clone();
            let client = client.clone();
            async move { client.chat_completions(&token, payload, stream, vision).await }
        })
        .await;

    match result.value {
        Ok(ChatCompletionsResponse::Sync(mut response)) => {
            restore_tool_names_in_response(&mut response, &tool_names);
            let unified: protocol::unified::UnifiedResponse = response.into();
            Ok(AnthropicOutcome::Sync(Box::new(unified.into())))
        }
        Ok(ChatCompletionsResponse::Stream(stream)) => {
            let message_id = format!("msg_{}", uuid::Uuid::new_v4());
            let translator = StreamTranslator::new(message_id);
            let state = TranslationState {
                stream,
                translator,
                tool_names,
                pending: VecDeque::new(),
                finished: false,
            };
            Ok(AnthropicOutcome::Stream(Box::pin(futures::stream::unfold(state, translate_next))))
        }
        Err(err) => Err(normalize_upstream_error(err, ctx.limits(), &model_id)),
    }
}

/// State threaded through [`translate_next`], driving the OpenAI→Anthropic stream translation.
struct TranslationState {
    stream: ChunkStream,
    translator: StreamTranslator,
    tool_names: ToolNameMap,
    pending: VecDeque<AnthropicStreamEvent>,
    finished: bool,
}

/// `futures::stream::unfold` step function: drains buffered events before pulling the next
/// upstream chunk, and calls [`StreamTranslator::finish`] once the upstream stream ends so a
/// `finish_reason=null` ending still produces a clean `message_delta`+`message_stop` pair (§8).
async fn translate_next(mut state: TranslationState) -> Option<(AnthropicStreamEvent, TranslationState)> {
    loop {
        if let Some(event) = state.pending.pop_front() {
            return Some((event, state));
        }
        if state.finished {
            return None;
        }

        match state.stream.next().await {
            Some(Ok(chunk)) => {
                let events = state.translator.process_chunk(chunk.into(), &state.tool_names);
                state.pending = events.into();
            }
            Some(Err(err)) => {
                state.pending = VecDeque::from([StreamTranslator::error_event(err.to_string())]);
                state.finished = true;
            }
            None => {
                state.pending = state.translator.finish().into();
                state.finished = true;
            }
        }
    }
}

/// The bearer token the pipeline is currently presenting upstream, for handlers that need to
/// make an ad-hoc call outside the translate/compact pipeline (e.g. `GET /usage`).
pub fn current_token(ctx: &AppContext) -> SecretString {
    ctx.tokens().current_short_token()
}

/// Timer helper for history recording around a pipeline call.
pub fn start_timer() -> Instant {
    Instant::now()
}
