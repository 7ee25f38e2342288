//! Per-client fixed-window rate limiting.
//!
//! Every client key owns one counter that lives until its window expires.
//! Entries are created on first sight, replaced lazily once expired, and
//! swept in bulk by [`crate::sweeper::Sweeper`]. State is in-memory and
//! per-process: separate instances enforce separate limits.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::RateLimitError;

pub const DEFAULT_WINDOW_MS: u64 = 15 * 60 * 1000;
pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

// Rate limit entry - tracks requests per IP/key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_time: u64, // epoch millis when the window closes
}

/// Limits applied to a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
    pub message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            max_requests: DEFAULT_MAX_REQUESTS,
            message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.window_ms == 0 {
            return Err(RateLimitError::InvalidConfig(
                "windowMs must be greater than zero".to_string(),
            ));
        }
        if self.max_requests == 0 {
            return Err(RateLimitError::InvalidConfig(
                "maxRequests must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns a copy with the fields present in `overrides` replaced.
    pub fn merged(&self, overrides: &RateLimitConfigOverride) -> Self {
        Self {
            window_ms: overrides.window_ms.unwrap_or(self.window_ms),
            max_requests: overrides.max_requests.unwrap_or(self.max_requests),
            message: overrides
                .message
                .clone()
                .unwrap_or_else(|| self.message.clone()),
        }
    }
}

// Partial config sent by callers in the request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfigOverride {
    pub window_ms: Option<u64>,
    pub max_requests: Option<u32>,
    pub message: Option<String>,
}

/// Outcome of a check. `remaining` is set when allowed, `message` when rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub reset_time: u64,
    pub limit: u32,
}

impl RateLimitDecision {
    fn allowed(remaining: u32, reset_time: u64, limit: u32) -> Self {
        Self {
            allowed: true,
            remaining: Some(remaining),
            message: None,
            reset_time,
            limit,
        }
    }

    fn rejected(message: &str, reset_time: u64, limit: u32) -> Self {
        Self {
            allowed: false,
            remaining: None,
            message: Some(message.to_string()),
            reset_time,
            limit,
        }
    }

    /// Whole seconds until the window closes, never less than one.
    pub fn retry_after_secs(&self, now_millis: u64) -> u64 {
        self.reset_time.saturating_sub(now_millis).div_ceil(1000).max(1)
    }

    /// Window close as epoch seconds, rounded up.
    pub fn reset_epoch_secs(&self) -> u64 {
        self.reset_time.div_ceil(1000)
    }
}

pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Counts one request for `key` against `config`.
    ///
    /// The lookup and update run under the shard lock of `key`, so racing
    /// requests for the same client never lose an increment.
    pub fn check(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(RateLimitError::MissingKey);
        }
        config.validate()?;

        let now = self.clock.now_millis();
        let fresh = RateLimitEntry {
            count: 1,
            reset_time: now.saturating_add(config.window_ms),
        };
        let fresh_decision = RateLimitDecision::allowed(
            config.max_requests - 1,
            fresh.reset_time,
            config.max_requests,
        );

        let decision = match self.entries.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(fresh);
                fresh_decision
            }
            Entry::Occupied(mut slot) => {
                let entry = slot.get_mut();
                if now > entry.reset_time {
                    // window expired, start over
                    *entry = fresh;
                    fresh_decision
                } else if entry.count >= config.max_requests {
                    RateLimitDecision::rejected(
                        &config.message,
                        entry.reset_time,
                        config.max_requests,
                    )
                } else {
                    entry.count += 1;
                    RateLimitDecision::allowed(
                        config.max_requests - entry.count,
                        entry.reset_time,
                        config.max_requests,
                    )
                }
            }
        };
        Ok(decision)
    }

    /// Forgets `key`. Returns whether an entry existed.
    pub fn reset(&self, key: &str) -> bool {
        self.entries.remove(key.trim()).is_some()
    }

    /// Drops every entry whose window has closed and returns how many went.
    ///
    /// Removals are counted inside `retain`, so keys inserted or reset by
    /// concurrent calls are not part of the result.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = now <= entry.reset_time;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key.trim()).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
