//! Small standalone routes: health, root banner, usage, current token, and the event-logging
//! sink the Copilot CLI posts batches to (accepted and discarded, §4.J).

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::context::AppContext;
use crate::error::normalize_upstream_error;

pub async fn root() -> &'static str {
    "copilot-proxy"
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn usage(State(ctx): State<AppContext>) -> Response {
    let token = ctx.tokens().current_short_token();
    match ctx.client().usage(&token).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => normalize_upstream_error(err, ctx.limits(), "usage").into_response(),
    }
}

pub async fn token(State(ctx): State<AppContext>) -> Response {
    let token = ctx.tokens().current_short_token();
    Json(serde_json::json!({ "token": token.expose_secret() })).into_response()
}

/// Accepts a batch of client-side telemetry events and discards them; this proxy keeps no
/// analytics pipeline of its own.
pub async fn event_logging_batch(Json(_body): Json<Value>) -> StatusCode {
    StatusCode::ACCEPTED
}
