use sha2::{Digest, Sha256};
use std::time::Instant;
use crate::models::AskRequest;

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub response: String,
    pub created_at: Instant,
}

// Create a cache key (hash of model + question + top_k)
pub fn answer_cache_key(model: &str, req: &AskRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model);
    hasher.update(&req.question);
    hasher.update(req.top_k.to_le_bytes());
    format!("{:x}", hasher.finalize())
}
