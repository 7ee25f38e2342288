use serde::{Deserialize, Serialize};
use crate::rate_limit::RateLimitConfigOverride;

// What the caller wants done for its client key
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Check,
    Reset,
}

// Rate limit API request format
#[derive(Deserialize, Debug, Clone)]
pub struct RateLimitRequest {
    pub action: Action,
    #[serde(default)]
    pub config: Option<RateLimitConfigOverride>,
}

// Reset response format
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ResetResponse {
    pub message: String,
    pub ip: String,
}
