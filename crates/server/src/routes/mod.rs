//! HTTP surface (§4.J): route handlers, grouped by wire protocol.

mod chat;
mod embeddings;
mod messages;
mod misc;
mod models;

use axum::Router;
use axum::routing::{get, post};

use crate::context::AppContext;

/// Builds the full router. CORS and other cross-cutting layers are applied by the caller.
pub fn router() -> Router<AppContext> {
    Router::new()
        .route("/", get(misc::root))
        .route("/health", get(misc::health))
        .route("/usage", get(misc::usage))
        .route("/token", get(misc::token))
        .route("/chat/completions", post(chat::chat_completions))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/models", get(models::openai_models))
        .route("/v1/models", get(models::anthropic_models))
        .route("/embeddings", post(embeddings::embeddings))
        .route("/v1/embeddings", post(embeddings::embeddings))
        .route("/v1/messages", post(messages::messages))
        .route("/v1/messages/count_tokens", post(messages::count_tokens))
        .route("/api/event_logging/batch", post(misc::event_logging_batch))
}
