use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("kbgw_requests_total", "Total number of requests").unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter =
        register_counter!("kbgw_rate_limited_total", "Total requests rejected by the rate limiter").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("kbgw_cache_hits_total", "Total answer cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("kbgw_cache_misses_total", "Total answer cache misses").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "kbgw_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("kbgw_cache_size", "Current number of items in the answer cache").unwrap();
    pub static ref TRACKED_IDENTITIES: Gauge =
        register_gauge!("kbgw_rate_tracked_identities", "Identities currently tracked by the rate limiter").unwrap();
}
