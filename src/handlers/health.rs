use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::state::AppState;

// health handler
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "healthy_backends": state.backends.healthy_count(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
