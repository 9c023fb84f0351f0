use clap::Parser;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kb_gateway::backend::{BackendPool, health_checker};
use kb_gateway::config::Args;
use kb_gateway::rate_limit::{RateLimiter, RateLimiterConfig};
use kb_gateway::state::{AppState, RouteLimits};
use kb_gateway::worker::{PromptContext, prompt_worker};

// this is main async function with tokio
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();

    // misconfiguration aborts startup, never surfaces at call time
    let limiter_config = RateLimiterConfig::new(args.rate_window_ms, args.rate_max_identities)
        .expect("invalid rate limiter configuration");

    let (prompt_tx, prompt_rx) = mpsc::channel(100);

    let pool = Arc::new(BackendPool::new(&args.completion_backends));
    let cache = Arc::new(DashMap::new());
    let client = reqwest::Client::new();

    // creating shared state
    let state = Arc::new(AppState {
        client: client.clone(),
        cache: Arc::clone(&cache),
        ttl: Duration::from_secs(args.cache_ttl),
        backends: Arc::clone(&pool),
        rate_limiter: Arc::new(RateLimiter::new(limiter_config)),
        limits: RouteLimits {
            ask: args.ask_limit,
            embed: args.embed_limit,
            ingest: args.ingest_limit,
        },
        embedding_url: args.embedding_url.clone(),
        vector_url: args.vector_url.clone(),
        embedding_model: args.embedding_model.clone(),
        prompt_tx,
    });

    // spawn the background worker
    tokio::spawn(prompt_worker(
        prompt_rx,
        PromptContext {
            client: client.clone(),
            pool: Arc::clone(&pool),
            cache,
            ttl: Duration::from_secs(args.cache_ttl),
            embedding_url: args.embedding_url.clone(),
            vector_url: args.vector_url.clone(),
            completion_model: args.completion_model.clone(),
            embedding_model: args.embedding_model.clone(),
        },
    ));

    // spawn the backend health checker
    tokio::spawn(health_checker(
        Arc::clone(&pool),
        client,
        Duration::from_secs(args.health_interval),
    ));

    let app = kb_gateway::app(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    info!(port = args.port, "gateway running");
    info!(
        window_ms = args.rate_window_ms,
        max_identities = args.rate_max_identities,
        ask = args.ask_limit,
        embed = args.embed_limit,
        ingest = args.ingest_limit,
        "rate limits configured"
    );
    info!(ttl_secs = args.cache_ttl, "answer cache configured");

    axum::serve(listener, app).await.unwrap();
}
