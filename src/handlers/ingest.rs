use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

use crate::backend;
use crate::error::{GatewayError, quota_headers};
use crate::handlers::enforce_quota;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{DocumentMetadata, IngestRequest, IngestResponse};
use crate::state::AppState;

// Upload endpoint: embed the document text and upsert it into the index
pub async fn ingest_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<IngestRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    REQUEST_TOTAL.inc();

    let quota = enforce_quota(&state, &headers, state.limits.ingest)?;

    let start_time = Instant::now();

    let values = backend::fetch_embedding(
        &state.client,
        &state.embedding_url,
        &state.embedding_model,
        &payload.text,
    )
    .await?;

    let id = payload.id.unwrap_or_else(|| document_id(&payload.text));
    let metadata = DocumentMetadata {
        title: payload.title,
        text: Some(payload.text),
    };

    let upserted =
        backend::upsert_vector(&state.client, &state.vector_url, id.clone(), values, metadata)
            .await?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok((quota_headers(&quota), Json(IngestResponse { id, upserted })))
}

// Content-addressed id for documents uploaded without one
fn document_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
