//! Admission-control rate limiting.
//!
//! Every externally reachable proxy route asks [`AdmissionGate::check`]
//! before doing any downstream work. Records live in a capacity-bounded
//! in-memory store: a record expires after the configured window, and when
//! the store is full the least-recently-used identity is evicted early.
//! Counters are per-process only — restarts reset all quotas.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Invalid limiter configuration, rejected at construction time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitConfigError {
    #[error("rate limit window must be greater than zero")]
    ZeroWindow,
    #[error("rate limit identity capacity must be greater than zero")]
    ZeroCapacity,
}

/// Validated limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub window: Duration,
    pub max_identities: usize,
}

impl RateLimiterConfig {
    pub fn new(window_ms: u64, max_identities: usize) -> Result<Self, RateLimitConfigError> {
        if window_ms == 0 {
            return Err(RateLimitConfigError::ZeroWindow);
        }
        if max_identities == 0 {
            return Err(RateLimitConfigError::ZeroCapacity);
        }
        Ok(Self {
            window: Duration::from_millis(window_ms),
            max_identities,
        })
    }
}

/// Quota snapshot reported with every decision, used for the
/// `X-RateLimit-Limit` / `X-RateLimit-Remaining` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateQuota {
    pub limit: u32,
    pub remaining: u32,
}

/// Outcome of a rate limit check. `Exceeded` is an expected result the
/// caller branches on, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Admitted(RateQuota),
    Exceeded(RateQuota),
}

impl RateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateDecision::Admitted(_))
    }

    pub fn quota(&self) -> RateQuota {
        match self {
            RateDecision::Admitted(q) | RateDecision::Exceeded(q) => *q,
        }
    }
}

/// Seam for swapping the in-process store for a shared one (e.g. a
/// distributed counter) without touching handler code.
pub trait AdmissionGate: Send + Sync {
    fn check(&self, identity: &str, limit: u32) -> RateDecision;

    /// Number of identities currently tracked.
    fn tracked(&self) -> usize;
}

// Per-identity accounting. `last_access` is a monotonic stamp used for
// LRU ordering; `window_start` anchors the TTL at record creation.
struct RateRecord {
    count: u32,
    window_start: Instant,
    last_access: u64,
}

struct RecordStore {
    records: HashMap<String, RateRecord>,
    clock: u64,
}

/// Fixed-window limiter over a capacity-bounded LRU + TTL record store.
///
/// The whole read-increment-write sequence runs under one mutex, so
/// concurrent checks for the same identity can never observe the same
/// pre-increment count. The lock is never held across an await point.
pub struct RateLimiter {
    window: Duration,
    max_identities: usize,
    store: Mutex<RecordStore>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            window: config.window,
            max_identities: config.max_identities,
            store: Mutex::new(RecordStore {
                records: HashMap::new(),
                clock: 0,
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    // Drop expired records; if the store is still full, evict the
    // least-recently-used one. Whichever bound is hit first wins.
    fn reclaim(&self, store: &mut RecordStore, now: Instant) {
        let window = self.window;
        store
            .records
            .retain(|_, record| now.duration_since(record.window_start) < window);

        if store.records.len() >= self.max_identities {
            let lru = store
                .records
                .iter()
                .min_by_key(|(_, record)| record.last_access)
                .map(|(identity, _)| identity.clone());
            if let Some(identity) = lru {
                debug!(identity = %identity, "evicting least-recently-used rate record");
                store.records.remove(&identity);
            }
        }
    }
}

impl AdmissionGate for RateLimiter {
    fn check(&self, identity: &str, limit: u32) -> RateDecision {
        let now = Instant::now();
        let mut store = self.store.lock().unwrap();
        store.clock += 1;
        let stamp = store.clock;

        // An expired record counts as absent: the next request opens a
        // fresh window.
        let expired = store
            .records
            .get(identity)
            .is_some_and(|record| now.duration_since(record.window_start) >= self.window);
        if expired {
            store.records.remove(identity);
        }

        if !store.records.contains_key(identity) && store.records.len() >= self.max_identities {
            self.reclaim(&mut store, now);
        }

        let record = store
            .records
            .entry(identity.to_string())
            .or_insert(RateRecord {
                count: 0,
                window_start: now,
                last_access: stamp,
            });
        record.count += 1;
        record.last_access = stamp;

        let quota = RateQuota {
            limit,
            remaining: limit.saturating_sub(record.count),
        };

        // The limit-th request is the last one admitted.
        if record.count > limit {
            warn!(identity = %identity, limit, "rate limit exceeded");
            RateDecision::Exceeded(quota)
        } else {
            debug!(identity = %identity, count = record.count, limit, "request admitted");
            RateDecision::Admitted(quota)
        }
    }

    fn tracked(&self) -> usize {
        self.store.lock().unwrap().records.len()
    }
}
