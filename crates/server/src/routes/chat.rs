//! `POST /chat/completions` and `/v1/chat/completions`: the OpenAI-shaped route.

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures::{Stream, StreamExt};
use protocol::openai::ChatCompletionRequest;

use crate::context::AppContext;
use crate::pipeline::{self, OpenAiOutcome};

pub async fn chat_completions(State(ctx): State<AppContext>, Json(payload): Json<ChatCompletionRequest>) -> Response {
    let stream = payload.stream.unwrap_or(false);

    match pipeline::openai_chat_completions(&ctx, payload, stream).await {
        Ok(OpenAiOutcome::Sync(response)) => Json(response).into_response(),
        Ok(OpenAiOutcome::Stream(chunks)) => Sse::new(sse_events(chunks)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn sse_events(
    chunks: impl Stream<Item = Result<protocol::openai::ChatCompletionChunk, crate::error::ApiError>> + Send + 'static,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    chunks
        .map(|chunk| match chunk {
            Ok(chunk) => Event::default().json_data(chunk).unwrap_or_else(|_| Event::default().data("{}")),
            Err(err) => Event::default()
                .event("error")
                .json_data(serde_json::json!({ "error": err.to_string() }))
                .unwrap_or_else(|_| Event::default().event("error").data(err.to_string())),
        })
        .map(Ok)
        .chain(futures::stream::once(async { Ok(Event::default().data("[DONE]")) }))
}
