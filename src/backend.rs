//! Downstream services: the completion backend pool and the typed calls to
//! the embedding and vector index services.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, interval};
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, DocumentMetadata,
    EmbeddingsApiRequest, EmbeddingsApiResponse, VectorMatch, VectorQueryRequest,
    VectorQueryResponse, VectorRecord, VectorUpsertRequest, VectorUpsertResponse,
};

// Single completion backend

pub struct Backend {
    pub url: String,
    healthy: AtomicBool,
}

impl Backend {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

// Pool of completion backends with round-robin selection

pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    current: AtomicUsize,
}

impl BackendPool {
    // Create from comma-separated urls "localhost:8001,localhost:8002"
    pub fn new(backends_str: &str) -> Self {
        let backends: Vec<Arc<Backend>> = backends_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                // add http:// if not present
                let full_url = if url.starts_with("http") {
                    url.to_string()
                } else {
                    format!("http://{}", url)
                };
                Arc::new(Backend::new(full_url))
            })
            .collect();
        if backends.is_empty() {
            panic!("at least one completion backend required");
        }

        info!(count = backends.len(), "completion backend pool initialized");
        for backend in &backends {
            info!(url = %backend.url, "registered completion backend");
        }

        Self {
            backends,
            current: AtomicUsize::new(0),
        }
    }

    // Get next healthy backend (round-robin)
    pub fn next_healthy(&self) -> Option<Arc<Backend>> {
        let len = self.backends.len();
        let start = self.current.fetch_add(1, Ordering::Relaxed) % len;

        for i in 0..len {
            let idx = (start + i) % len;
            let backend = &self.backends[idx];

            if backend.is_healthy() {
                return Some(Arc::clone(backend));
            }
        }
        None
    }

    pub fn all_backends(&self) -> &Vec<Arc<Backend>> {
        &self.backends
    }

    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_healthy()).count()
    }
}

// Periodic health probe against each backend's model listing endpoint

pub async fn health_checker(
    pool: Arc<BackendPool>,
    client: reqwest::Client,
    check_interval: Duration,
) {
    let mut interval = interval(check_interval);

    info!(interval_secs = check_interval.as_secs(), "backend health checker started");

    loop {
        interval.tick().await;

        for backend in pool.all_backends() {
            let url = format!("{}/v1/models", backend.url);

            let was_healthy = backend.is_healthy();

            let is_healthy = match client.get(&url).timeout(Duration::from_secs(5)).send().await {
                Ok(res) => res.status().is_success(),
                Err(_) => false,
            };
            backend.set_healthy(is_healthy);

            // Log status changes
            if was_healthy != is_healthy {
                if is_healthy {
                    info!(url = %backend.url, "backend is now healthy");
                } else {
                    warn!(url = %backend.url, "backend is now unhealthy");
                }
            }
        }
    }
}

// ---- typed upstream calls ----

pub async fn fetch_embedding(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    input: &str,
) -> Result<Vec<f32>, GatewayError> {
    let body = EmbeddingsApiRequest {
        model: model.to_string(),
        input: input.to_string(),
    };

    let response = client
        .post(format!("{}/v1/embeddings", base_url))
        .json(&body)
        .send()
        .await
        .and_then(|res| res.error_for_status())
        .map_err(|e| GatewayError::Upstream(format!("embedding request failed: {}", e)))?
        .json::<EmbeddingsApiResponse>()
        .await
        .map_err(|e| GatewayError::Upstream(format!("embedding parse error: {}", e)))?;

    response
        .data
        .into_iter()
        .next()
        .map(|row| row.embedding)
        .ok_or_else(|| GatewayError::Upstream("embedding service returned no vectors".to_string()))
}

pub async fn query_index(
    client: &reqwest::Client,
    base_url: &str,
    vector: &[f32],
    top_k: usize,
) -> Result<Vec<VectorMatch>, GatewayError> {
    let body = VectorQueryRequest {
        vector: vector.to_vec(),
        top_k,
        include_metadata: true,
    };

    let response = client
        .post(format!("{}/query", base_url))
        .json(&body)
        .send()
        .await
        .and_then(|res| res.error_for_status())
        .map_err(|e| GatewayError::Upstream(format!("vector query failed: {}", e)))?
        .json::<VectorQueryResponse>()
        .await
        .map_err(|e| GatewayError::Upstream(format!("vector query parse error: {}", e)))?;

    Ok(response.matches)
}

pub async fn upsert_vector(
    client: &reqwest::Client,
    base_url: &str,
    id: String,
    values: Vec<f32>,
    metadata: DocumentMetadata,
) -> Result<u32, GatewayError> {
    let body = VectorUpsertRequest {
        vectors: vec![VectorRecord { id, values, metadata }],
    };

    let response = client
        .post(format!("{}/vectors/upsert", base_url))
        .json(&body)
        .send()
        .await
        .and_then(|res| res.error_for_status())
        .map_err(|e| GatewayError::Upstream(format!("vector upsert failed: {}", e)))?
        .json::<VectorUpsertResponse>()
        .await
        .map_err(|e| GatewayError::Upstream(format!("vector upsert parse error: {}", e)))?;

    Ok(response.upserted_count)
}

pub async fn chat_completion(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    messages: Vec<ChatMessage>,
) -> Result<String, GatewayError> {
    let body = ChatCompletionRequest {
        model: model.to_string(),
        messages,
    };

    let response = client
        .post(format!("{}/v1/chat/completions", base_url))
        .json(&body)
        .send()
        .await
        .and_then(|res| res.error_for_status())
        .map_err(|e| GatewayError::Upstream(format!("completion request failed: {}", e)))?
        .json::<ChatCompletionResponse>()
        .await
        .map_err(|e| GatewayError::Upstream(format!("completion parse error: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| GatewayError::Upstream("completion backend returned no choices".to_string()))
}
