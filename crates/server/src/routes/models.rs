//! `GET /models` and `/v1/models`: the cached model catalog, in each wire protocol's shape.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use protocol::openai::ModelsResponse;
use protocol::unified::{UnifiedModel, UnifiedModelsResponse, UnifiedObjectType};
use upstream::model::Vendor;

use crate::context::AppContext;

pub async fn openai_models(State(ctx): State<AppContext>) -> Response {
    let response: ModelsResponse = catalog(&ctx).into();
    Json(response).into_response()
}

pub async fn anthropic_models(State(ctx): State<AppContext>) -> Response {
    let response: protocol::anthropic::AnthropicModelsResponse = catalog(&ctx).into();
    Json(response).into_response()
}

fn catalog(ctx: &AppContext) -> UnifiedModelsResponse {
    let models = ctx.models().into_iter().map(to_unified).collect();
    UnifiedModelsResponse { object_type: UnifiedObjectType::List, models, has_more: false }
}

fn to_unified(model: upstream::model::Model) -> UnifiedModel {
    UnifiedModel {
        id: model.id,
        object_type: if model.vendor == Vendor::Anthropic { UnifiedObjectType::Message } else { UnifiedObjectType::Model },
        display_name: model.display_name,
        created: 0,
        owned_by: match model.vendor {
            Vendor::OpenAi => "openai".to_string(),
            Vendor::Anthropic => "anthropic".to_string(),
        },
    }
}
