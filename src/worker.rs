use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::backend::{self, BackendPool};
use crate::cache::{CacheEntry, answer_cache_key};
use crate::error::GatewayError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, CACHE_SIZE};
use crate::models::{AskRequest, AskResponse, ChatMessage, QueuedPrompt, SourceRef, VectorMatch};

// Everything the worker needs to answer a question
pub struct PromptContext {
    pub client: reqwest::Client,
    pub pool: Arc<BackendPool>,
    pub cache: Arc<DashMap<String, CacheEntry>>,
    pub ttl: Duration,
    pub embedding_url: String,
    pub vector_url: String,
    pub completion_model: String,
    pub embedding_model: String,
}

// Background worker -> answers queued questions one by one

pub async fn prompt_worker(mut rx: mpsc::Receiver<QueuedPrompt>, ctx: PromptContext) {
    info!("prompt worker started - answering questions sequentially");

    // keep receiving questions from the queue
    while let Some(job) = rx.recv().await {
        let cache_key = answer_cache_key(&ctx.completion_model, &job.request);

        // check cache first
        if let Some(entry) = ctx.cache.get(&cache_key) {
            if entry.created_at.elapsed() < ctx.ttl {
                CACHE_HITS.inc();
                if let Ok(response) = serde_json::from_str::<AskResponse>(&entry.response) {
                    let _ = job.response_tx.send(Ok(response));
                    continue;
                }
            }
        }
        CACHE_MISSES.inc();

        let result = answer_question(&ctx, &job.request).await;

        // saving to cache
        if let Ok(answer) = &result {
            if let Ok(json) = serde_json::to_string(answer) {
                ctx.cache.insert(cache_key, CacheEntry {
                    response: json,
                    created_at: Instant::now(),
                });
                CACHE_SIZE.set(ctx.cache.len() as f64);
            }
        }

        // Send response back to handler
        let _ = job.response_tx.send(result);
    }
}

// Retrieve context for the question, then ask a completion backend
async fn answer_question(
    ctx: &PromptContext,
    request: &AskRequest,
) -> Result<AskResponse, GatewayError> {
    let vector = backend::fetch_embedding(
        &ctx.client,
        &ctx.embedding_url,
        &ctx.embedding_model,
        &request.question,
    )
    .await?;

    let matches =
        backend::query_index(&ctx.client, &ctx.vector_url, &vector, request.top_k).await?;

    let chosen = ctx.pool.next_healthy().ok_or(GatewayError::NoBackend)?;

    let messages = build_messages(&request.question, &matches);
    let answer = match backend::chat_completion(
        &ctx.client,
        &chosen.url,
        &ctx.completion_model,
        messages,
    )
    .await
    {
        Ok(answer) => answer,
        Err(e) => {
            // Marking backend as unhealthy on error
            chosen.set_healthy(false);
            warn!(url = %chosen.url, "completion backend failed, marked unhealthy");
            return Err(e);
        }
    };

    Ok(AskResponse {
        answer,
        sources: matches
            .iter()
            .map(|m| SourceRef {
                id: m.id.clone(),
                score: m.score,
            })
            .collect(),
    })
}

fn build_messages(question: &str, matches: &[VectorMatch]) -> Vec<ChatMessage> {
    let context = if matches.is_empty() {
        "No matching documents were found.".to_string()
    } else {
        matches
            .iter()
            .filter_map(|m| m.metadata.as_ref())
            .filter_map(|meta| meta.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n---\n")
    };

    vec![
        ChatMessage {
            role: "system".to_string(),
            content: format!(
                "You are the knowledge-base assistant. Answer using only the context below. \
                 If the context does not cover the question, say so.\n\nContext:\n{}",
                context
            ),
        },
        ChatMessage {
            role: "user".to_string(),
            content: question.to_string(),
        },
    ]
}
