use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static VERSION_OPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grafer_version_ops_total",
        "Version store operations by operation and outcome",
        &["op", "outcome"]
    )
    .expect("register version_ops_total")
});

pub static CONTENT_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grafer_content_requests_total",
        "Requests sent to the contents API by method and status class",
        &["method", "status"]
    )
    .expect("register content_requests_total")
});

pub static CSV_SAVES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "grafer_csv_saves_total",
        "CSV saves by target and outcome",
        &["target", "outcome"]
    )
    .expect("register csv_saves_total")
});

pub fn record_version_op(op: &str, outcome: &str) {
    VERSION_OPS_TOTAL.with_label_values(&[op, outcome]).inc();
}

pub fn record_content_request(method: &str, status: Option<u16>) {
    let class = match status {
        Some(s) if s < 300 => "2xx",
        Some(s) if s < 400 => "3xx",
        Some(s) if s < 500 => "4xx",
        Some(_) => "5xx",
        None => "network",
    };
    CONTENT_REQUESTS_TOTAL.with_label_values(&[method, class]).inc();
}

pub fn record_csv_save(target: &str, ok: bool) {
    CSV_SAVES_TOTAL.with_label_values(&[target, if ok { "ok" } else { "error" }]).inc();
}

/// Render the default registry in the text exposition format.
pub fn encode_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("metrics encode error: {e}"))?;
    String::from_utf8(buffer).map_err(|e| format!("metrics encode error: {e}"))
}
