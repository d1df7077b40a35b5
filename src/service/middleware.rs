//! Service middleware for request metrics.
//!
//! ## Metrics Exposed
//!
//! - `request` - Request count and latency by path pattern, method, status
//! - `split` - Fragment count and pipeline latency per create/update

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::info;

/// Metrics middleware that records request counts and latency.
///
/// Logged through tracing so the numbers can be aggregated from logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "plateau_split::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Numeric project ids become `:id`.
fn normalize_path(path: &str) -> String {
    static PROJECT_ID: OnceLock<Option<regex_lite::Regex>> = OnceLock::new();
    match PROJECT_ID.get_or_init(|| regex_lite::Regex::new(r"/-?[0-9]+(/|$)").ok()) {
        Some(regex) => regex.replace_all(path, "/:id$1").to_string(),
        None => path.to_string(),
    }
}

/// Record split pipeline metrics for one create or update.
pub fn record_split_metrics(operation: &str, fragment_count: usize, latency_ms: u64) {
    info!(
        target: "plateau_split::metrics",
        metric_type = "split",
        operation = operation,
        fragment_count = fragment_count,
        latency_ms = latency_ms,
        "split_metric"
    );
}
