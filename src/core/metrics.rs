use std::sync::OnceLock;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    metrics::describe_counter!("http_requests_total", "HTTP responses by method, path and status");
    metrics::describe_histogram!("http_request_duration_seconds", "HTTP request latency");
    metrics::describe_counter!("procedure_calls_total", "Stored procedure calls by outcome");
    metrics::describe_histogram!("procedure_call_duration_seconds", "Stored procedure latency");
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_http(method: String, path: String, status: u16, latency: Duration) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(latency.as_secs_f64());
}

pub(crate) fn record_procedure(procedure: &str, outcome: &'static str, latency: Duration) {
    metrics::counter!(
        "procedure_calls_total",
        "procedure" => procedure.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("procedure_call_duration_seconds", "procedure" => procedure.to_string())
        .record(latency.as_secs_f64());
}
