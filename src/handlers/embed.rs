use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use std::sync::Arc;
use std::time::Instant;

use crate::backend;
use crate::error::{GatewayError, quota_headers};
use crate::handlers::enforce_quota;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{EmbedRequest, EmbedResponse};
use crate::state::AppState;

// Embedding proxy endpoint
pub async fn embed_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<EmbedRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    REQUEST_TOTAL.inc();

    let quota = enforce_quota(&state, &headers, state.limits.embed)?;

    let start_time = Instant::now();

    let embedding = backend::fetch_embedding(
        &state.client,
        &state.embedding_url,
        &state.embedding_model,
        &payload.input,
    )
    .await?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok((
        quota_headers(&quota),
        Json(EmbedResponse {
            dimension: embedding.len(),
            embedding,
        }),
    ))
}
