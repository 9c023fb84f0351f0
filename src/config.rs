use clap::Parser;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "kb-gateway")]
#[command(about = "Rate-limited caching gateway for a knowledge-base assistant")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Completion backend servers (comma-separated)
    // Example: "localhost:8001,localhost:8002"
    #[arg(short, long, default_value = "localhost:8001")]
    pub completion_backends: String,

    // Embedding service base URL
    #[arg(long, default_value = "http://localhost:8002")]
    pub embedding_url: String,

    // Vector index service base URL
    #[arg(long, default_value = "http://localhost:8003")]
    pub vector_url: String,

    // Model requested from the completion backends
    #[arg(long, default_value = "gpt-4o-mini")]
    pub completion_model: String,

    // Model requested from the embedding service
    #[arg(long, default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    // Answer cache TTL in seconds
    #[arg(short = 't', long, default_value_t = 30)]
    pub cache_ttl: u64,

    // Max /api/ask requests per identity per window
    #[arg(long, default_value_t = 10)]
    pub ask_limit: u32,

    // Max /api/embed requests per identity per window
    #[arg(long, default_value_t = 30)]
    pub embed_limit: u32,

    // Max /api/ingest requests per identity per window
    #[arg(long, default_value_t = 20)]
    pub ingest_limit: u32,

    // Rate limit window in milliseconds
    #[arg(long, default_value_t = 60_000)]
    pub rate_window_ms: u64,

    // Max identities tracked by the rate limiter before LRU eviction
    #[arg(long, default_value_t = 500)]
    pub rate_max_identities: usize,

    // Backend health check interval in seconds
    #[arg(long, default_value_t = 30)]
    pub health_interval: u64
}
