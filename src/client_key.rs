use axum::http::HeaderMap;
use std::net::SocketAddr;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const REAL_IP: &str = "x-real-ip";
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Picks the rate limit key for a request.
///
/// Order: first entry of `X-Forwarded-For`, then `X-Real-IP`, then the peer
/// address, then the shared `"unknown"` bucket. The headers are taken at
/// face value, so any client can choose its own key by sending them.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    forwarded_for(headers)
        .or_else(|| header_value(headers, REAL_IP))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(FORWARDED_FOR)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}
