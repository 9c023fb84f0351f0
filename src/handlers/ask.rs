use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

use crate::error::{GatewayError, quota_headers};
use crate::handlers::enforce_quota;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{AskRequest, QueuedPrompt};
use crate::state::AppState;

// Retrieval-augmented question endpoint. The rate limit decision happens
// before the request is allowed anywhere near the prompt queue.
pub async fn ask_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<AskRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    REQUEST_TOTAL.inc();

    let quota = enforce_quota(&state, &headers, state.limits.ask)?;

    let start_time = Instant::now();

    let (response_tx, response_rx) = oneshot::channel();

    let queued = QueuedPrompt {
        request: payload,
        response_tx,
    };

    state
        .prompt_tx
        .send(queued)
        .await
        .map_err(|_| GatewayError::QueueClosed)?;

    let result = response_rx.await.map_err(|_| GatewayError::QueueClosed)?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(|answer| (quota_headers(&quota), Json(answer)))
}
