//! Gateway error type and its HTTP mapping.

use axum::Json;
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::rate_limit::RateQuota;

#[derive(Debug, Error)]
pub enum GatewayError {
    // Expected outcome, surfaced as HTTP 429 with quota headers.
    #[error("rate limit exceeded, try again later")]
    RateLimited(RateQuota),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("no healthy completion backend available")]
    NoBackend,

    #[error("prompt queue is not accepting requests")]
    QueueClosed,
}

/// Header pairs every gated route attaches, on success and on rejection.
pub fn quota_headers(quota: &RateQuota) -> [(HeaderName, String); 2] {
    [
        (
            HeaderName::from_static("x-ratelimit-limit"),
            quota.limit.to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            quota.remaining.to_string(),
        ),
    ]
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::NoBackend | GatewayError::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));

        match self {
            GatewayError::RateLimited(quota) => {
                (status, quota_headers(&quota), body).into_response()
            }
            _ => (status, body).into_response(),
        }
    }
}
