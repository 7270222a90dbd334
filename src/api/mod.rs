//! The API layer: handlers, routing, middleware, and rate limiting.

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod rate_limit;
pub mod router;

pub use rate_limit::{RateLimitConfig, RateLimitState, SlidingWindowLimiter};
pub use router::{create_router, create_router_with_rate_limit};
