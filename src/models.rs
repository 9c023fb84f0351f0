use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::GatewayError;

fn default_top_k() -> usize {
    3
}

// Question endpoint request format
#[derive(Deserialize, Serialize, Clone)]
pub struct AskRequest {
    pub question: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

// Which indexed documents the answer was grounded on
#[derive(Deserialize, Serialize, Clone)]
pub struct SourceRef {
    pub id: String,
    pub score: f32,
}

#[derive(Deserialize, Serialize)]
pub struct EmbedRequest {
    pub input: String,
}

#[derive(Deserialize, Serialize)]
pub struct EmbedResponse {
    pub dimension: usize,
    pub embedding: Vec<f32>,
}

#[derive(Deserialize, Serialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub text: String,
}

#[derive(Deserialize, Serialize)]
pub struct IngestResponse {
    pub id: String,
    pub upserted: u32,
}

// Queued question - holds request + response channel
pub struct QueuedPrompt {
    pub request: AskRequest,
    pub response_tx: oneshot::Sender<Result<AskResponse, GatewayError>>,
}

// ---- completion backend wire format (OpenAI-style) ----

#[derive(Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

// ---- embedding service wire format ----

#[derive(Serialize)]
pub struct EmbeddingsApiRequest {
    pub model: String,
    pub input: String,
}

#[derive(Deserialize)]
pub struct EmbeddingsApiResponse {
    pub data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
pub struct EmbeddingRow {
    pub embedding: Vec<f32>,
}

// ---- vector index wire format (camelCase on the wire) ----

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorQueryRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub include_metadata: bool,
}

#[derive(Deserialize)]
pub struct VectorQueryResponse {
    #[serde(default)]
    pub matches: Vec<VectorMatch>,
}

#[derive(Deserialize, Serialize, Clone)]
pub struct VectorMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
}

#[derive(Deserialize, Serialize, Clone, Default)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Serialize)]
pub struct VectorUpsertRequest {
    pub vectors: Vec<VectorRecord>,
}

#[derive(Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: DocumentMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorUpsertResponse {
    pub upserted_count: u32,
}
