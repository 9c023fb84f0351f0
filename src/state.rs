use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use crate::backend::BackendPool;
use crate::cache::CacheEntry;
use crate::models::QueuedPrompt;
use crate::rate_limit::AdmissionGate;
// app's shared state

// Per-route admission limits, all counted against the same window
#[derive(Debug, Clone, Copy)]
pub struct RouteLimits {
    pub ask: u32,
    pub embed: u32,
    pub ingest: u32,
}

pub struct AppState {
    pub client: reqwest::Client,
    pub cache: Arc<DashMap<String, CacheEntry>>, // shared with the prompt worker
    pub ttl: Duration,                           // how long cached answers stay valid
    pub backends: Arc<BackendPool>,
    pub rate_limiter: Arc<dyn AdmissionGate>,
    pub limits: RouteLimits,
    pub embedding_url: String,
    pub vector_url: String,
    pub embedding_model: String,
    pub prompt_tx: mpsc::Sender<QueuedPrompt>,
}
