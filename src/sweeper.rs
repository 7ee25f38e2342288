use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics::{SWEPT_ENTRIES, TRACKED_CLIENTS};
use crate::rate_limit::RateLimiter;

/// Background task that drops expired limiter entries on a fixed interval.
///
/// Expired entries are also replaced lazily by `check`, so the sweep only
/// bounds memory. It runs until its token is cancelled.
pub struct Sweeper {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub fn spawn(limiter: Arc<RateLimiter>, every: Duration, token: CancellationToken) -> Self {
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            run(limiter, every, task_token).await;
        });
        Self { token, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    // Cancel and wait for the task to exit. Returns false if the task panicked.
    pub async fn shutdown(self) -> bool {
        self.token.cancel();
        match self.handle.await {
            Ok(()) => true,
            Err(e) => {
                error!("Rate limit sweeper task failed: {}", e);
                false
            }
        }
    }
}

async fn run(limiter: Arc<RateLimiter>, every: Duration, token: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick fires immediately
    ticker.tick().await;

    info!("Rate limit sweeper started (interval: {:?})", every);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Rate limit sweeper stopped");
                return;
            }
            _ = ticker.tick() => {
                let removed = limiter.sweep();
                if removed > 0 {
                    SWEPT_ENTRIES.inc_by(removed as f64);
                    debug!(removed, remaining = limiter.len(), "swept expired rate limit entries");
                }
                TRACKED_CLIENTS.set(limiter.len() as f64);
            }
        }
    }
}
