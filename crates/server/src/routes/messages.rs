//! `POST /v1/messages` and `/v1/messages/count_tokens`: the Anthropic-shaped route.

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use compactor::CompactionOptions;
use futures::{Stream, StreamExt};
use protocol::anthropic::{AnthropicChatRequest, AnthropicStreamEvent};

use crate::context::AppContext;
use crate::pipeline::{self, AnthropicOutcome};

pub async fn messages(State(ctx): State<AppContext>, Json(payload): Json<AnthropicChatRequest>) -> Response {
    let stream = payload.stream.unwrap_or(false);

    match pipeline::anthropic_messages(&ctx, payload, stream).await {
        Ok(AnthropicOutcome::Sync(response)) => Json(response).into_response(),
        Ok(AnthropicOutcome::Stream(events)) => Sse::new(sse_events(events)).into_response(),
        Err(err) => err.into_anthropic_response(),
    }
}

/// Counts tokens for a request without dispatching it upstream.
///
/// When auto-compact would fire for this payload+model, the real count is replaced with the
/// inflated `floor(0.95 * max_context_window_tokens)` value the client should see instead
/// (§4.J, §8 scenario 6) — reporting the true count would understate how close the request is
/// to triggering compaction.
pub async fn count_tokens(State(ctx): State<AppContext>, Json(payload): Json<AnthropicChatRequest>) -> Response {
    let model_id = payload.model.clone();
    let is_anthropic_vendor = ctx.model(&model_id).map(|m| m.vendor == upstream::model::Vendor::Anthropic).unwrap_or(false);
    let capabilities = ctx.model(&model_id).map(|m| m.capabilities).unwrap_or_default();
    let tokenizer = ctx.config().tokenizer.build(Some(&capabilities.tokenizer_name), is_anthropic_vendor);

    let request: protocol::unified::UnifiedRequest = payload.into();
    let system_text = request.system.clone().unwrap_or_default();
    let input_tokens = tokenizer.count_messages(&request.messages) + tokenizer.count_text(&system_text);

    let would_compact = ctx.config().compaction.enabled && {
        let options: CompactionOptions = (&ctx.config().compaction).into();
        let outcome = compactor::compact_request(request, &tokenizer, ctx.limits(), &model_id, capabilities.max_context_window_tokens, &options);
        outcome.was_compacted
    };

    let input_tokens = if would_compact {
        (capabilities.max_context_window_tokens as f64 * 0.95).floor() as u32
    } else {
        input_tokens
    };

    Json(serde_json::json!({ "input_tokens": input_tokens })).into_response()
}

fn sse_events(events: impl Stream<Item = AnthropicStreamEvent> + Send + 'static) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    events.map(|event| {
        let event_name = event_name(&event);
        let sse_event = Event::default()
            .event(event_name)
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().event(event_name).data("{}"));
        Ok(sse_event)
    })
}

fn event_name(event: &AnthropicStreamEvent) -> &'static str {
    match event {
        AnthropicStreamEvent::MessageStart { .. } => "message_start",
        AnthropicStreamEvent::ContentBlockStart { .. } => "content_block_start",
        AnthropicStreamEvent::ContentBlockDelta { .. } => "content_block_delta",
        AnthropicStreamEvent::ContentBlockStop { .. } => "content_block_stop",
        AnthropicStreamEvent::MessageDelta { .. } => "message_delta",
        AnthropicStreamEvent::MessageStop => "message_stop",
        AnthropicStreamEvent::Ping => "ping",
        AnthropicStreamEvent::Error { .. } => "error",
    }
}
