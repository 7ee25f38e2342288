//! In-process tests of the `/api/rate-limit` contract.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use bokario_rate_limiter::{
    AppState, ManualClock, RateLimitConfig, RateLimiter, metrics::REQUEST_LATENCY, router,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn app(clock: Arc<ManualClock>, max_requests: u32) -> (Router, Arc<RateLimiter>) {
    let limiter = Arc::new(RateLimiter::with_clock(clock));
    let defaults = RateLimitConfig {
        window_ms: 1_000,
        max_requests,
        message: "Too many requests".to_string(),
    };
    let state = Arc::new(AppState::new(limiter.clone(), defaults));
    (router(state), limiter)
}

fn post(body: &str, ip: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/rate-limit")
        .header("content-type", "application/json");
    if let Some(ip) = ip {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

const CHECK: &str = r#"{"action":"check"}"#;
const RESET: &str = r#"{"action":"reset"}"#;

// ── check ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_check_allows_until_limit_then_429() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, _) = app(clock, 2);

    let (status, headers, body) = send(&app, post(CHECK, Some("203.0.113.1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "allowed": true, "remaining": 1, "resetTime": 1000, "limit": 2 }));
    assert_eq!(headers["x-ratelimit-limit"], "2");
    assert_eq!(headers["x-ratelimit-remaining"], "1");
    assert_eq!(headers["x-ratelimit-reset"], "1");
    assert!(headers.get("retry-after").is_none());

    let (status, _, body) = send(&app, post(CHECK, Some("203.0.113.1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining"], 0);

    let (status, headers, body) = send(&app, post(CHECK, Some("203.0.113.1"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body,
        json!({ "allowed": false, "message": "Too many requests", "resetTime": 1000, "limit": 2 })
    );
    assert_eq!(headers["x-ratelimit-remaining"], "0");
    assert_eq!(headers["retry-after"], "1");
}

#[tokio::test]
async fn test_window_expiry_restores_access() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, _) = app(clock.clone(), 1);

    send(&app, post(CHECK, Some("1.1.1.1"))).await;
    let (status, _, _) = send(&app, post(CHECK, Some("1.1.1.1"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    clock.set(1_001);
    let (status, _, body) = send(&app, post(CHECK, Some("1.1.1.1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resetTime"], 2_001);
}

#[tokio::test]
async fn test_clients_are_partitioned_by_forwarded_ip() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, limiter) = app(clock, 1);

    let (status, _, _) = send(&app, post(CHECK, Some("10.0.0.1, 172.16.0.1"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, post(CHECK, Some("10.0.0.2"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, post(CHECK, Some("10.0.0.1"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    assert!(limiter.get("10.0.0.1").is_some());
    assert!(limiter.get("10.0.0.2").is_some());
    assert_eq!(limiter.len(), 2);
}

#[tokio::test]
async fn test_unidentified_clients_share_unknown_bucket() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, limiter) = app(clock, 1);

    let (status, _, _) = send(&app, post(CHECK, None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, post(CHECK, None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(limiter.get("unknown").is_some());
}

#[tokio::test]
async fn test_config_override_applies_per_request() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, _) = app(clock, 100);

    let body =
        r#"{"action":"check","config":{"windowMs":5000,"maxRequests":1,"message":"custom"}}"#;
    let (status, _, first) = send(&app, post(body, Some("9.9.9.9"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["limit"], 1);
    assert_eq!(first["resetTime"], 5_000);

    let (status, _, second) = send(&app, post(body, Some("9.9.9.9"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second["message"], "custom");
}

// ── reset ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reset_clears_caller_and_is_idempotent() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, limiter) = app(clock, 1);

    send(&app, post(CHECK, Some("5.5.5.5"))).await;
    let (status, _, _) = send(&app, post(CHECK, Some("5.5.5.5"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    for _ in 0..2 {
        let (status, _, body) = send(&app, post(RESET, Some("5.5.5.5"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Rate limit reset successfully", "ip": "5.5.5.5" }));
        assert!(limiter.get("5.5.5.5").is_none());
    }

    let (status, _, body) = send(&app, post(CHECK, Some("5.5.5.5"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining"], 0);
}

// ── malformed requests ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_malformed_requests_are_400() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, limiter) = app(clock, 5);

    for body in [
        "",
        "not json",
        "{}",
        r#"{"action":"purge"}"#,
        r#"{"action":"check","config":{"maxRequests":0}}"#,
        r#"{"action":"check","config":{"windowMs":0}}"#,
    ] {
        let (status, _, json) = send(&app, post(body, Some("7.7.7.7"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body:?}");
        assert!(json["error"].is_string(), "body: {body:?}");
    }
    assert!(limiter.is_empty());
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, limiter) = app(clock, 5);

    let padding = " ".repeat(32 * 1024);
    let body = format!(r#"{{"action":"check"}}{padding}"#);
    let (status, _, json) = send(&app, post(&body, Some("6.6.6.6"))).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(json["error"].as_str().unwrap().contains("16384"));
    assert!(limiter.is_empty());
}

#[tokio::test]
async fn test_latency_observed_for_malformed_requests() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, _) = app(clock, 5);

    let before = REQUEST_LATENCY.get_sample_count();
    let (status, _, _) = send(&app, post("not json", Some("3.3.3.3"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(REQUEST_LATENCY.get_sample_count() > before);
}

#[tokio::test]
async fn test_non_post_is_405() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, _) = app(clock, 5);

    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let req = Request::builder()
            .method(method.clone())
            .uri("/api/rate-limit")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "method {method}");
    }
}

// ── health / metrics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_reports_tracked_clients() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, _) = app(clock, 5);
    send(&app, post(CHECK, Some("8.8.8.8"))).await;

    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["tracked_clients"], 1);
}

#[tokio::test]
async fn test_metrics_exposes_check_counter() {
    let clock = Arc::new(ManualClock::new(0));
    let (app, _) = app(clock, 5);
    send(&app, post(CHECK, Some("4.4.4.4"))).await;

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("rate_limit_checks_total"));
    assert!(text.contains("rate_limit_requests_total"));
}
