mod ask;
mod embed;
mod health;
mod ingest;
mod metrics;

pub use ask::ask_handler;
pub use embed::embed_handler;
pub use health::health_handler;
pub use ingest::ingest_handler;
pub use metrics::metrics_handler;

use axum::http::{HeaderMap, header};
use sha2::{Digest, Sha256};

use crate::error::GatewayError;
use crate::metrics::{RATE_LIMITED_TOTAL, TRACKED_IDENTITIES};
use crate::rate_limit::{AdmissionGate, RateDecision, RateQuota};
use crate::state::AppState;

// Derive the rate-limit identity for a request. Bearer tokens are hashed
// so the raw credential never becomes a map key or a log field; otherwise
// the first X-Forwarded-For hop identifies the caller.
pub(crate) fn caller_identity(headers: &HeaderMap) -> String {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            return format!("key:{:x}", hasher.finalize());
        }
    }

    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(ip) = forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return format!("ip:{}", ip);
        }
    }

    "anonymous".to_string()
}

// Rate limit gate shared by all proxy routes. Must run before any
// downstream call; an Exceeded decision becomes the 429 response.
pub(crate) fn enforce_quota(
    state: &AppState,
    headers: &HeaderMap,
    limit: u32,
) -> Result<RateQuota, GatewayError> {
    let identity = caller_identity(headers);
    let decision = state.rate_limiter.check(&identity, limit);
    TRACKED_IDENTITIES.set(state.rate_limiter.tracked() as f64);

    match decision {
        RateDecision::Admitted(quota) => Ok(quota),
        RateDecision::Exceeded(quota) => {
            RATE_LIMITED_TOTAL.inc();
            Err(GatewayError::RateLimited(quota))
        }
    }
}
