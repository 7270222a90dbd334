//! Per-client sliding-window rate limiting for route groups.
//!
//! The store is in-memory and per-process; multi-instance deployments need
//! a shared store instead. Each route group (general API, health, meta)
//! gets its own limiter so budgets never interfere.

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use dashmap::DashMap;
use metrics::counter;
use tracing::warn;

use crate::domain::ErrorBody;

/// Outcome of a limiter check. `retry_after_ms` is zero when allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after_ms: u64,
}

impl Decision {
    /// `Retry-After` header value, rounded up to whole seconds.
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_ms.div_ceil(1000)
    }
}

/// Sliding-window limiter keyed by client identity.
///
/// Admission keeps the last `limit` request timestamps per key inside a
/// trailing window. Rejected requests are never recorded, so a client
/// hammering a saturated limiter does not push its own recovery further out.
pub struct SlidingWindowLimiter {
    limit: u32,
    window_ms: u64,
    hits: DashMap<String, Vec<u64>>,
}

impl SlidingWindowLimiter {
    pub fn new(limit: u32, window_ms: u64) -> Self {
        Self {
            limit,
            window_ms,
            hits: DashMap::new(),
        }
    }

    /// Check and record a request for `key` at the current time.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, chrono::Utc::now().timestamp_millis() as u64)
    }

    /// Check and record a request for `key` at an explicit clock reading.
    /// Tests drive this directly for deterministic time.
    pub fn check_at(&self, key: &str, now_ms: u64) -> Decision {
        let mut stamps = self.hits.entry(key.to_string()).or_default();

        let window_start = now_ms.saturating_sub(self.window_ms);
        stamps.retain(|&t| t > window_start);

        if stamps.len() as u64 >= u64::from(self.limit) {
            // Oldest retained stamp decides when a slot frees up.
            let oldest = stamps.first().copied().unwrap_or(now_ms);
            let retry_after_ms = self
                .window_ms
                .saturating_sub(now_ms.saturating_sub(oldest));
            return Decision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                retry_after_ms,
            };
        }

        stamps.push(now_ms);
        Decision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - stamps.len() as u32,
            retry_after_ms: 0,
        }
    }

    /// Drop all recorded requests. Used between tests.
    pub fn reset(&self) {
        self.hits.clear();
    }
}

/// Best-effort client identity: first `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the literal `"unknown"`. Unidentified clients share
/// one budget.
pub fn client_id<B>(request: &Request<B>) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(s) = forwarded.to_str() {
            if let Some(first) = s.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
    }
    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(s) = real_ip.to_str() {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    "unknown".to_string()
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Max requests per window for the resource endpoints
    pub general_limit: u32,
    /// Window size in milliseconds for the resource endpoints
    pub general_window_ms: u64,
    /// Max requests per window for the health endpoint
    pub health_limit: u32,
    /// Window size in milliseconds for the health endpoint
    pub health_window_ms: u64,
    /// Max requests per window for the index/openapi endpoints
    pub meta_limit: u32,
    /// Window size in milliseconds for the index/openapi endpoints
    pub meta_window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_limit: 120,
            general_window_ms: 60_000,
            health_limit: 30,
            health_window_ms: 10_000,
            meta_limit: 20,
            meta_window_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            general_limit: var_or("RATE_LIMIT_GENERAL_LIMIT", 120),
            general_window_ms: var_or("RATE_LIMIT_GENERAL_WINDOW_MS", 60_000),
            health_limit: var_or("RATE_LIMIT_HEALTH_LIMIT", 30),
            health_window_ms: var_or("RATE_LIMIT_HEALTH_WINDOW_MS", 10_000),
            meta_limit: var_or("RATE_LIMIT_META_LIMIT", 20),
            meta_window_ms: var_or("RATE_LIMIT_META_WINDOW_MS", 60_000),
        }
    }
}

/// Shared limiter state, one limiter per route group.
pub struct RateLimitState {
    pub general: SlidingWindowLimiter,
    pub health: SlidingWindowLimiter,
    pub meta: SlidingWindowLimiter,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            general: SlidingWindowLimiter::new(config.general_limit, config.general_window_ms),
            health: SlidingWindowLimiter::new(config.health_limit, config.health_window_ms),
            meta: SlidingWindowLimiter::new(config.meta_limit, config.meta_window_ms),
        }
    }

    /// Drop every recorded request across all groups. Used between tests.
    pub fn reset(&self) {
        self.general.reset();
        self.health.reset();
        self.meta.reset();
    }
}

fn rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
}

async fn enforce(
    limiter: &SlidingWindowLimiter,
    scope: &'static str,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client = client_id(&request);
    let decision = limiter.check(&client);

    if decision.allowed {
        let mut response = next.run(request).await;
        rate_limit_headers(response.headers_mut(), &decision);
        return response;
    }

    counter!("rate_limit_rejections_total", "scope" => scope).increment(1);
    warn!(
        scope,
        client = %client,
        retry_after_ms = decision.retry_after_ms,
        "rate limit exceeded"
    );

    let body = ErrorBody {
        error: "Too many requests".to_string(),
        code: "RATE_LIMITED".to_string(),
        details: None,
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    rate_limit_headers(headers, &decision);
    headers.insert("Retry-After", HeaderValue::from(decision.retry_after_secs()));
    response
}

/// Rate limit middleware for the resource endpoints (per-client budget)
pub async fn rate_limit_general_middleware(
    State(state): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    enforce(&state.general, "general", request, next).await
}

/// Rate limit middleware for the health endpoint
pub async fn rate_limit_health_middleware(
    State(state): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    enforce(&state.health, "health", request, next).await
}

/// Rate limit middleware for the index and openapi endpoints
pub async fn rate_limit_meta_middleware(
    State(state): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    enforce(&state.meta, "meta", request, next).await
}
