use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// The learning subsystem is a placeholder: fixed-value metrics and a
// simulated training run, kept so clients have a stable surface to code
// against before the real pipeline lands.

#[derive(Debug, Deserialize, Default)]
pub struct TrainRequest {
    pub training_type: Option<String>,
}

pub async fn metrics(State(_state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "total_conversations": 0,
        "total_ai_messages": 0,
        "total_feedback": 0,
        "average_rating": 0.0,
        "feedback_coverage": 0.0,
        "learning_models_loaded": true,
        "last_training": null,
        "user_satisfaction": 0.0,
        "response_quality_score": 0.0,
        "personalization_level": 0.0,
        "improvement_suggestions": []
    }))
}

pub async fn analyze_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .store
        .conversations()
        .get(conversation_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("conversation {} not found", conversation_id))
        })?;

    let message_count = state.store.messages().count(conversation_id).await?;

    Ok(Json(json!({
        "conversation_id": conversation_id,
        "message_count": message_count,
        "topics_identified": [],
        "sentiment_analysis": {
            "overall_sentiment": "neutral",
            "sentiment_score": 0.0
        },
        "quality_metrics": {
            "coherence_score": 0.8,
            "relevance_score": 0.8,
            "helpfulness_score": 0.8
        },
        "learning_insights": []
    })))
}

pub async fn train(
    State(_state): State<AppState>,
    req: Option<Json<TrainRequest>>,
) -> Json<serde_json::Value> {
    let training_type = req
        .and_then(|Json(r)| r.training_type)
        .unwrap_or_else(|| "incremental".to_string());
    let now = Utc::now();

    Json(json!({
        "status": "completed",
        "training_type": training_type,
        "start_time": now,
        "end_time": now,
        "duration_seconds": 0.1,
        "models_updated": ["response_quality", "user_preferences"],
        "performance_metrics": {
            "accuracy_improvement": 0.02,
            "response_quality_score": 0.85
        }
    }))
}
