mod health;
mod metrics;
mod rate_limit;

use axum::{Router, routing::{get, post}};
use std::sync::Arc;
use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use rate_limit::rate_limit_handler;

pub const RATE_LIMIT_PATH: &str = "/api/rate-limit";

// creating the router with routes
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(RATE_LIMIT_PATH, post(rate_limit_handler)) // other methods get 405
        .with_state(state)
}
