use clap::Parser;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::rate_limit::{
    DEFAULT_MAX_REQUESTS, DEFAULT_MESSAGE, DEFAULT_WINDOW_MS, RateLimitConfig,
};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "bokario-rate-limiter")]
#[command(about = "Per-client fixed-window rate limiter for the Bokario API")]
pub struct Args {
    // Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Default window length in milliseconds
    #[arg(long, default_value_t = DEFAULT_WINDOW_MS)]
    pub window_ms: u64,

    // Default max requests per window per client
    #[arg(long, default_value_t = DEFAULT_MAX_REQUESTS)]
    pub max_requests: u32,

    // Message returned with 429 responses
    #[arg(long, default_value = DEFAULT_MESSAGE)]
    pub message: String,

    // Seconds between sweeps of expired entries
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Seconds to wait for background tasks on shutdown
    #[arg(long, default_value_t = 5)]
    pub shutdown_timeout: u64,
}

impl Args {
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            window_ms: self.window_ms,
            max_requests: self.max_requests,
            message: self.message.clone(),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        // tokio's interval panics on a zero period
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    // host may be a name like "localhost", not only an IP literal
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind((self.host.as_str(), self.port)).await
    }
}
