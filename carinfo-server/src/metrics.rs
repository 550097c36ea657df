//! Prometheus metrics for the CarInfo server

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

/// Initialize all metric descriptions
pub fn init_metrics() {
    describe_counter!(
        "carinfo_http_requests_total",
        "Total number of HTTP requests by method, route and status"
    );
    describe_counter!(
        "carinfo_authorization_decisions_total",
        "Total number of authorization decisions by outcome"
    );
    describe_counter!("carinfo_errors_total", "Total number of error responses by kind");

    describe_histogram!(
        "carinfo_authorization_latency_seconds",
        "Time spent obtaining an authorization decision"
    );
    describe_histogram!(
        "carinfo_store_latency_seconds",
        "Time spent in a store read-modify-write operation"
    );
}

/// Record a handled HTTP request
pub fn record_request(method: &str, route: &str, status: u16) {
    counter!(
        "carinfo_http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an authorization decision
pub fn record_decision(allowed: bool, latency_seconds: f64) {
    let outcome = if allowed { "allow" } else { "deny" };
    counter!("carinfo_authorization_decisions_total", "outcome" => outcome).increment(1);
    histogram!("carinfo_authorization_latency_seconds").record(latency_seconds);
}

/// Record an error response
pub fn record_error(kind: &'static str) {
    counter!("carinfo_errors_total", "kind" => kind).increment(1);
}

/// Timer for a store operation
pub struct LatencyTimer {
    start: Instant,
    operation: &'static str,
}

impl LatencyTimer {
    /// Start timing `operation`
    pub fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Record the elapsed time under the operation label
    pub fn record(self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        histogram!("carinfo_store_latency_seconds", "operation" => self.operation).record(elapsed);
    }
}

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Calling it again is a no-op.
pub fn init_prometheus() -> anyhow::Result<()> {
    if PROMETHEUS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Prometheus handle already set"))?;
    init_metrics();
    Ok(())
}

/// Render metrics in the Prometheus text format
pub fn render() -> String {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Prometheus metrics not initialized\n".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_timer_shows_up_in_render() {
        init_prometheus().unwrap();
        LatencyTimer::new("list_cars").record();
        record_decision(true, 0.002);

        let text = render();
        assert!(text.contains("carinfo_store_latency_seconds"));
        assert!(text.contains("operation=\"list_cars\""));
        assert!(text.contains("carinfo_authorization_decisions_total"));
    }
}
