use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use colloquy_engine::{EngineStatus, OptionsPatch};
use colloquy_store::{Feedback, FeedbackSubmission};
use colloquy_types::{Envelope, GenerationOptions};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::orchestrator::{run_exchange, ExchangeRequest};
use crate::state::AppState;
use crate::streaming::chunk_stream;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub message: String,
    pub user_id: i64,
    pub conversation_id: Option<i64>,
    /// Optional per-request generation overrides.
    pub config: Option<OptionsPatch>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub reply: Envelope,
    pub conversation_id: Option<i64>,
    pub user_message_id: Option<i64>,
    pub assistant_message_id: Option<i64>,
    pub persisted: bool,
    pub persistence_failed: bool,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub message_id: i64,
    pub user_id: i64,
    pub rating: u8,
    pub comment: Option<String>,
    pub category: Option<String>,
}

pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let outcome = run_exchange(
        &state.store,
        &state.engine,
        ExchangeRequest {
            conversation_id: req.conversation_id,
            user_id: req.user_id,
            message: req.message,
            options: req.config,
        },
    )
    .await?;

    Ok(Json(GenerateResponse {
        conversation_id: outcome.user_message.as_ref().map(|m| m.conversation_id),
        user_message_id: outcome.user_message.map(|m| m.id),
        assistant_message_id: outcome.assistant_message.map(|m| m.id),
        persisted: outcome.persisted,
        persistence_failed: outcome.persistence_failed,
        reply: outcome.reply,
    }))
}

/// Same pipeline as `generate`, delivered as word-chunk SSE events with a
/// terminal `end` sentinel.
pub async fn stream(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let outcome = run_exchange(
        &state.store,
        &state.engine,
        ExchangeRequest {
            conversation_id: req.conversation_id,
            user_id: req.user_id,
            message: req.message,
            options: req.config,
        },
    )
    .await?;

    let delay = Duration::from_millis(state.config.streaming.chunk_delay_ms);
    Ok(Sse::new(chunk_stream(outcome, delay)).keep_alive(KeepAlive::default()))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<(StatusCode, Json<Feedback>)> {
    if !(1..=5).contains(&req.rating) {
        return Err(ApiError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    state
        .store
        .messages()
        .get(req.message_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("message {} not found", req.message_id)))?;

    let (feedback, created) = state
        .store
        .feedback()
        .submit(FeedbackSubmission {
            message_id: req.message_id,
            user_id: req.user_id,
            rating: req.rating,
            comment: req.comment,
            category: req.category,
        })
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    tracing::info!(
        message_id = req.message_id,
        user_id = req.user_id,
        created,
        "feedback recorded"
    );
    Ok((status, Json(feedback)))
}

pub async fn status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.engine.status())
}

pub async fn get_config(State(state): State<AppState>) -> Json<GenerationOptions> {
    Json(state.engine.options())
}

/// Replace generation options; unknown keys are rejected by the patch
/// deserializer before this handler runs.
pub async fn update_config(
    State(state): State<AppState>,
    Json(patch): Json<OptionsPatch>,
) -> ApiResult<Json<GenerationOptions>> {
    if patch.is_empty() {
        return Err(ApiError::BadRequest(
            "no configurable keys in request".to_string(),
        ));
    }
    if let Some(max_tokens) = patch.max_tokens {
        if max_tokens == 0 || max_tokens > 4096 {
            return Err(ApiError::BadRequest(
                "max_tokens must be between 1 and 4096".to_string(),
            ));
        }
    }
    if let Some(temperature) = patch.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ApiError::BadRequest(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }
    }
    if let Some(top_p) = patch.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            return Err(ApiError::BadRequest(
                "top_p must be between 0.0 and 1.0".to_string(),
            ));
        }
    }

    let options = state.engine.update_options(patch);
    tracing::info!("generation options updated");
    Ok(Json(options))
}

/// Static catalog of selectable backends.
pub async fn models(State(state): State<AppState>) -> Json<serde_json::Value> {
    let active = state.engine.status();
    Json(json!({
        "active": active.active,
        "models": [
            {
                "id": "demo",
                "name": "Demo (rule-based)",
                "description": "Respostas baseadas em regras, sempre disponível",
                "requires": []
            },
            {
                "id": "remote",
                "name": "Remote (OpenAI-compatible)",
                "description": "Endpoint chat/completions compatível com OpenAI",
                "requires": ["OPENAI_API_KEY"]
            },
            {
                "id": "local",
                "name": "Local (llama.cpp server)",
                "description": "Servidor de inferência local",
                "requires": ["ai.local_url"]
            }
        ]
    }))
}
