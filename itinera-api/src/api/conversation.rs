//! Conversation API Handlers
//!
//! HTTP endpoints for conversation management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use itinera_core::domain::conversation::Conversation;
use itinera_core::dto::conversation::{ConversationDetail, ConversationSummary, CreateConversation};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::conversation_service;

/// POST /api/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(req): Json<CreateConversation>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    let conversation = conversation_service::create_conversation(state.store.as_ref(), req).await?;

    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ConversationSummary>>> {
    tracing::debug!("Listing conversations");

    let conversations = conversation_service::list_conversations(state.store.as_ref()).await?;

    Ok(Json(conversations))
}

/// GET /api/conversations/{id}
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConversationDetail>> {
    tracing::debug!("Getting conversation: {}", id);

    let conversation = conversation_service::get_conversation(state.store.as_ref(), id).await?;

    Ok(Json(conversation))
}

/// DELETE /api/conversations/{id}
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting conversation: {}", id);

    conversation_service::delete_conversation(state.store.as_ref(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}
