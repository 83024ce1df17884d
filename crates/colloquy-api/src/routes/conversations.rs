use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use colloquy_store::{
    Conversation, ConversationFilter, ConversationPatch, Message, NewConversation,
};
use colloquy_types::Metadata;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    pub user_id: i64,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Include archived conversations in the listing.
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateConversationRequest {
    pub user_id: i64,
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversationRequest {
    pub title: Option<String>,
    pub is_archived: Option<bool>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
pub struct GetConversationQuery {
    #[serde(default)]
    pub include_messages: bool,
    pub message_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// "asc" (default) or "desc".
    pub order: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> ApiResult<Json<Vec<Conversation>>> {
    state
        .store
        .users()
        .get(query.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", query.user_id)))?;

    let mut filter = ConversationFilter::for_user(query.user_id);
    filter.include_archived = query.archived;
    if let Some(limit) = query.limit {
        filter.limit = limit.clamp(1, 100);
    }
    if let Some(offset) = query.offset {
        filter.offset = offset.max(0);
    }

    let conversations = state.store.conversations().list(filter).await?;
    Ok(Json(conversations))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<(StatusCode, Json<Conversation>)> {
    state
        .store
        .users()
        .get(req.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", req.user_id)))?;

    let conversation = state
        .store
        .conversations()
        .create(NewConversation {
            user_id: req.user_id,
            title: req.title.filter(|t| !t.trim().is_empty()),
            metadata: req.metadata,
        })
        .await?;
    tracing::info!(conversation_id = conversation.id, "conversation created");
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<GetConversationQuery>,
) -> ApiResult<Json<ConversationDetail>> {
    let conversation = state
        .store
        .conversations()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("conversation {} not found", id)))?;

    let messages = if query.include_messages {
        let limit = query.message_limit.unwrap_or(50).clamp(1, 200);
        Some(state.store.messages().list(id, limit, 0, false).await?)
    } else {
        None
    };

    Ok(Json(ConversationDetail {
        conversation,
        messages,
    }))
}

pub async fn update_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateConversationRequest>,
) -> ApiResult<Json<Conversation>> {
    let patch = ConversationPatch {
        title: req.title,
        is_archived: req.is_archived,
        metadata: req.metadata,
    };
    let conversation = state
        .store
        .conversations()
        .update(id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("conversation {} not found", id)))?;
    Ok(Json(conversation))
}

/// Deletes the conversation together with its messages and their feedback.
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = state.store.conversations().delete(id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("conversation {} not found", id)));
    }
    tracing::info!(conversation_id = id, "conversation deleted");
    Ok(Json(json!({ "deleted": true })))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
    state
        .store
        .conversations()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("conversation {} not found", id)))?;

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let descending = matches!(query.order.as_deref(), Some("desc"));

    let messages = state
        .store
        .messages()
        .list(id, limit, offset, descending)
        .await?;
    Ok(Json(messages))
}
