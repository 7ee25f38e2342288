//! Per-client fixed-window rate limiting for the Bokario API.
//!
//! The library holds the limiter core ([`rate_limit::RateLimiter`]), client
//! key derivation, the background sweeper and the axum router that exposes
//! `POST /api/rate-limit`. The binary in `main.rs` wires them to a socket.

pub mod client_key;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ApiError, RateLimitError};
pub use handlers::router;
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use state::AppState;
pub use sweeper::Sweeper;
