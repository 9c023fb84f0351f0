pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod worker;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::handlers::{ask_handler, embed_handler, health_handler, ingest_handler, metrics_handler};
use crate::state::AppState;

// Router shared by main and the integration tests
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/ask", post(ask_handler))
        .route("/api/embed", post(embed_handler))
        .route("/api/ingest", post(ingest_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
