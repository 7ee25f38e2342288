use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter = register_counter!(
        "rate_limit_requests_total",
        "Total number of rate limit API requests"
    )
    .unwrap();
    pub static ref CHECKS: CounterVec = register_counter_vec!(
        "rate_limit_checks_total",
        "Rate limit checks by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref RESETS: Counter =
        register_counter!("rate_limit_resets_total", "Total manual rate limit resets").unwrap();
    pub static ref SWEPT_ENTRIES: Counter = register_counter!(
        "rate_limit_swept_entries_total",
        "Expired entries removed by the background sweep"
    )
    .unwrap();
    pub static ref TRACKED_CLIENTS: Gauge = register_gauge!(
        "rate_limit_tracked_clients",
        "Current number of tracked client keys"
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "rate_limit_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
}

pub fn record_check(allowed: bool) {
    let outcome = if allowed { "allowed" } else { "rejected" };
    CHECKS.with_label_values(&[outcome]).inc();
}

// Text exposition of the default registry
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| format!("Encode error: {}", e))?;
    String::from_utf8(buffer).map_err(|e| format!("Utf8 error: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_metrics() {
        record_check(true);
        RESETS.inc();
        TRACKED_CLIENTS.set(2.0);
        let text = render().unwrap();
        assert!(text.contains("rate_limit_checks_total"));
        assert!(text.contains("rate_limit_resets_total"));
        assert!(text.contains("rate_limit_tracked_clients"));
    }
}
