use axum::{
    Json,
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::client_key::client_key;
use crate::error::ApiError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL, RESETS, TRACKED_CLIENTS, record_check};
use crate::models::{Action, RateLimitRequest, ResetResponse};
use crate::rate_limit::RateLimitDecision;
use crate::state::AppState;

pub const MAX_BODY_BYTES: usize = 16 * 1024;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// `POST /api/rate-limit`
///
/// The body may carry a `config` override, and it replaces the server
/// defaults for that call. Nothing authenticates it, so any caller can
/// raise its own `maxRequests` or shorten its own `windowMs`. Treat this
/// endpoint as a cooperative check, not as enforcement against hostile
/// clients.
pub async fn rate_limit_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let result = handle(&state, request).await;

    // observed for rejected and malformed requests too
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    result
}

async fn handle(state: &AppState, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    // only present when served with connect info
    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(&parts.headers, peer);

    let body = read_body(body).await?;
    let payload = parse_request(&body)
        .inspect_err(|e| debug!(%key, error = %e, "malformed rate limit request"))?;

    let response = match payload.action {
        Action::Check => {
            let config = match &payload.config {
                Some(overrides) => state.defaults.merged(overrides),
                None => state.defaults.clone(),
            };
            let decision = state.limiter.check(&key, &config)?;
            record_check(decision.allowed);
            TRACKED_CLIENTS.set(state.limiter.len() as f64);

            if !decision.allowed {
                warn!(
                    %key,
                    reset_time = decision.reset_time,
                    limit = decision.limit,
                    "rate limit exceeded"
                );
            }
            decision_response(decision, state.limiter.now_millis())
        }
        Action::Reset => {
            let existed = state.limiter.reset(&key);
            RESETS.inc();
            TRACKED_CLIENTS.set(state.limiter.len() as f64);
            info!(%key, existed, "rate limit reset");

            Json(ResetResponse {
                message: "Rate limit reset successfully".to_string(),
                ip: key,
            })
            .into_response()
        }
    };
    Ok(response)
}

async fn read_body(body: Body) -> Result<Bytes, ApiError> {
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(ApiError::PayloadTooLarge(MAX_BODY_BYTES))
        }
        Err(e) => Err(ApiError::BadRequest(format!("unreadable body: {}", e))),
    }
}

fn parse_request(body: &Bytes) -> Result<RateLimitRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("missing request body".to_string()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))
}

// 200 or 429 with the X-RateLimit-* headers
fn decision_response(decision: RateLimitDecision, now_millis: u64) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining.unwrap_or(0)));
    headers.insert(RESET_HEADER, HeaderValue::from(decision.reset_epoch_secs()));

    let status = if decision.allowed {
        StatusCode::OK
    } else {
        headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from(decision.retry_after_secs(now_millis)),
        );
        StatusCode::TOO_MANY_REQUESTS
    };

    (status, headers, Json(decision)).into_response()
}
