use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

use kb_gateway::backend::BackendPool;
use kb_gateway::rate_limit::{RateLimiter, RateLimiterConfig};
use kb_gateway::state::{AppState, RouteLimits};
use kb_gateway::worker::{PromptContext, prompt_worker};

// Stub for all three downstream services on one ephemeral port. Returns
// the base URL and a counter of completion calls actually made.
async fn spawn_stub_backend() -> (String, Arc<AtomicU32>) {
    let completions = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&completions);

    let router = Router::new()
        .route(
            "/v1/embeddings",
            post(|| async {
                Json(json!({"data": [{"embedding": [0.1, 0.2, 0.3]}]}))
            }),
        )
        .route(
            "/query",
            post(|| async {
                Json(json!({
                    "matches": [{
                        "id": "doc-1",
                        "score": 0.92,
                        "metadata": {"title": "Handbook", "text": "PTO accrues monthly."}
                    }]
                }))
            }),
        )
        .route(
            "/vectors/upsert",
            post(|| async { Json(json!({"upsertedCount": 1})) }),
        )
        .route("/v1/models", get(|| async { Json(json!({"data": []})) }))
        .route(
            "/v1/chat/completions",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "choices": [{"message": {"role": "assistant", "content": "stub answer"}}]
                    }))
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}", addr), completions)
}

// Build the real router against the stub services, with its own limiter
// and prompt worker per test.
fn test_app(backend_url: &str, limits: RouteLimits) -> Router {
    let (prompt_tx, prompt_rx) = mpsc::channel(16);
    let pool = Arc::new(BackendPool::new(backend_url));
    let cache = Arc::new(DashMap::new());
    let client = reqwest::Client::new();

    let state = Arc::new(AppState {
        client: client.clone(),
        cache: Arc::clone(&cache),
        ttl: Duration::from_secs(30),
        backends: Arc::clone(&pool),
        rate_limiter: Arc::new(RateLimiter::new(
            RateLimiterConfig::new(60_000, 500).unwrap(),
        )),
        limits,
        embedding_url: backend_url.to_string(),
        vector_url: backend_url.to_string(),
        embedding_model: "text-embedding-3-small".to_string(),
        prompt_tx,
    });

    tokio::spawn(prompt_worker(
        prompt_rx,
        PromptContext {
            client,
            pool,
            cache,
            ttl: Duration::from_secs(30),
            embedding_url: backend_url.to_string(),
            vector_url: backend_url.to_string(),
            completion_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        },
    ));

    kb_gateway::app(state)
}

fn post_json(uri: &str, body: Value, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn health_reports_status_and_backends() {
    let (url, _) = spawn_stub_backend().await;
    let app = test_app(&url, RouteLimits { ask: 5, embed: 5, ingest: 5 });

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["healthy_backends"], 1);
}

#[tokio::test]
async fn embed_reports_decreasing_quota_headers() {
    let (url, _) = spawn_stub_backend().await;
    let app = test_app(&url, RouteLimits { ask: 5, embed: 3, ingest: 5 });
    let xff = [("x-forwarded-for", "203.0.113.7")];

    for expected_remaining in ["2", "1"] {
        let response = app
            .clone()
            .oneshot(post_json("/api/embed", json!({"input": "hello"}), &xff))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-ratelimit-limit"), "3");
        assert_eq!(
            header_str(&response, "x-ratelimit-remaining"),
            expected_remaining
        );

        let body = body_json(response).await;
        assert_eq!(body["dimension"], 3);
    }
}

#[tokio::test]
async fn embed_returns_429_when_quota_is_spent() {
    let (url, _) = spawn_stub_backend().await;
    let app = test_app(&url, RouteLimits { ask: 5, embed: 2, ingest: 5 });
    let xff = [("x-forwarded-for", "203.0.113.8")];

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json("/api/embed", json!({"input": "hello"}), &xff))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(post_json("/api/embed", json!({"input": "hello"}), &xff))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&response, "x-ratelimit-limit"), "2");
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), "0");

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("rate limit"));
}

#[tokio::test]
async fn distinct_callers_have_independent_quotas() {
    let (url, _) = spawn_stub_backend().await;
    let app = test_app(&url, RouteLimits { ask: 5, embed: 1, ingest: 5 });

    let first = app
        .clone()
        .oneshot(post_json(
            "/api/embed",
            json!({"input": "hello"}),
            &[("x-forwarded-for", "203.0.113.1")],
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let exhausted = app
        .clone()
        .oneshot(post_json(
            "/api/embed",
            json!({"input": "hello"}),
            &[("x-forwarded-for", "203.0.113.1")],
        ))
        .await
        .unwrap();
    assert_eq!(exhausted.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_caller = app
        .oneshot(post_json(
            "/api/embed",
            json!({"input": "hello"}),
            &[("x-forwarded-for", "203.0.113.2")],
        ))
        .await
        .unwrap();
    assert_eq!(other_caller.status(), StatusCode::OK);
}

#[tokio::test]
async fn bearer_tokens_and_ips_are_separate_identities() {
    let (url, _) = spawn_stub_backend().await;
    let app = test_app(&url, RouteLimits { ask: 5, embed: 1, ingest: 5 });
    let bearer = [("authorization", "Bearer staff-key-1")];

    let first = app
        .clone()
        .oneshot(post_json("/api/embed", json!({"input": "hello"}), &bearer))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let exhausted = app
        .clone()
        .oneshot(post_json("/api/embed", json!({"input": "hello"}), &bearer))
        .await
        .unwrap();
    assert_eq!(exhausted.status(), StatusCode::TOO_MANY_REQUESTS);

    let by_ip = app
        .oneshot(post_json(
            "/api/embed",
            json!({"input": "hello"}),
            &[("x-forwarded-for", "203.0.113.3")],
        ))
        .await
        .unwrap();
    assert_eq!(by_ip.status(), StatusCode::OK);
}

#[tokio::test]
async fn ask_answers_from_retrieval_and_caches() {
    let (url, completions) = spawn_stub_backend().await;
    let app = test_app(&url, RouteLimits { ask: 10, embed: 5, ingest: 5 });
    let xff = [("x-forwarded-for", "203.0.113.4")];

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/ask",
                json!({"question": "how does PTO accrue?"}),
                &xff,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["answer"], "stub answer");
        assert_eq!(body["sources"][0]["id"], "doc-1");
    }

    // second ask was served from the answer cache
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rate_limited_ask_never_reaches_the_backends() {
    let (url, completions) = spawn_stub_backend().await;
    let app = test_app(&url, RouteLimits { ask: 1, embed: 5, ingest: 5 });
    let xff = [("x-forwarded-for", "203.0.113.5")];

    let admitted = app
        .clone()
        .oneshot(post_json(
            "/api/ask",
            json!({"question": "first question"}),
            &xff,
        ))
        .await
        .unwrap();
    assert_eq!(admitted.status(), StatusCode::OK);
    assert_eq!(completions.load(Ordering::SeqCst), 1);

    // distinct question so a cache hit cannot mask a skipped backend call
    let rejected = app
        .oneshot(post_json(
            "/api/ask",
            json!({"question": "second question"}),
            &xff,
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ingest_embeds_and_upserts_documents() {
    let (url, _) = spawn_stub_backend().await;
    let app = test_app(&url, RouteLimits { ask: 5, embed: 5, ingest: 5 });
    let xff = [("x-forwarded-for", "203.0.113.6")];

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/ingest",
            json!({"title": "Handbook", "text": "PTO accrues monthly."}),
            &xff,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-ratelimit-limit"), "5");
    let body = body_json(response).await;
    assert_eq!(body["upserted"], 1);
    assert!(!body["id"].as_str().unwrap().is_empty());

    // explicit ids are preserved
    let response = app
        .oneshot(post_json(
            "/api/ingest",
            json!({"id": "doc-42", "text": "Expense policy."}),
            &xff,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["id"], "doc-42");
}
