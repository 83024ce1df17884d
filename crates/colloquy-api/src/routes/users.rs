use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use colloquy_store::{NewUser, User, UserPatch};
use colloquy_types::Metadata;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub preferences: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub preferences: Option<Metadata>,
    pub is_active: Option<bool>,
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    let users = state.store.users().list().await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    if username.is_empty() || email.is_empty() {
        return Err(ApiError::BadRequest(
            "username and email are required".to_string(),
        ));
    }

    let user = state
        .store
        .users()
        .create(NewUser {
            username,
            email,
            preferences: req.preferences,
        })
        .await?;
    tracing::info!(user_id = user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
    let user = state
        .store
        .users()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", id)))?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let patch = UserPatch {
        username: req.username,
        email: req.email,
        preferences: req.preferences,
        is_active: req.is_active,
    };
    let user = state
        .store
        .users()
        .update(id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {} not found", id)))?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = state.store.users().delete(id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("user {} not found", id)));
    }
    tracing::info!(user_id = id, "user deleted");
    Ok(Json(json!({ "deleted": true })))
}
