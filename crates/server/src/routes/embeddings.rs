//! `POST /embeddings` and `/v1/embeddings`: forwarded to upstream untranslated.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use crate::context::AppContext;
use crate::error::normalize_upstream_error;

pub async fn embeddings(State(ctx): State<AppContext>, Json(payload): Json<Value>) -> Response {
    let model_id = payload.get("model").and_then(|m| m.as_str()).unwrap_or("unknown").to_string();
    let token = ctx.tokens().current_short_token();
    let client = ctx.client().clone();

    let result = ctx
        .rate_limiter()
        .execute(|| {
            let token = token.clone();
            let payload = payload.clone();
            let client = client.clone();
            async move { client.embeddings(&token, payload).await }
        })
        .await;

    match result.value {
        Ok(body) => Json(body).into_response(),
        Err(err) => normalize_upstream_error(err, ctx.limits(), &model_id).into_response(),
    }
}
