use std::sync::Arc;
use crate::rate_limit::{RateLimitConfig, RateLimiter};

// app's shared state
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub defaults: RateLimitConfig, // used when the request carries no override
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, defaults: RateLimitConfig) -> Self {
        Self { limiter, defaults }
    }
}
