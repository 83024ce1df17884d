use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Liveness plus a database probe; degraded rather than failing when the
/// store cannot be reached.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.store.ping().await {
        Ok(()) => Json(json!({ "status": "healthy", "database": "connected" })),
        Err(err) => {
            tracing::error!("health probe failed: {err}");
            Json(json!({ "status": "degraded", "database": "unreachable" }))
        }
    }
}

pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.engine.status();
    Json(json!({
        "name": "Colloquy",
        "assistant": "Lia",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": status.active,
        "model": status.model,
    }))
}
